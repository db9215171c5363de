//! Project DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::project::AccessLevel;
use crate::validation::{Validate, ValidationError, validate_timeout};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub namespace_id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub shared_runners_enabled: bool,
    #[serde(default)]
    pub default_timeout_seconds: Option<u64>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub shared_runners_enabled: Option<bool>,
    pub default_timeout_seconds: Option<u64>,
}

/// Grants or changes a user's access on a project
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetMember {
    pub user_id: Uuid,
    pub access_level: AccessLevel,
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("Project name cannot be empty"));
    }

    if name.len() > 255 {
        return Err(ValidationError::new(
            "Project name is too long (max 255 characters)",
        ));
    }

    Ok(())
}

impl Validate for CreateProject {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if let Some(timeout) = self.default_timeout_seconds {
            validate_timeout("Default timeout", timeout)?;
        }
        Ok(())
    }
}

impl Validate for UpdateProject {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(timeout) = self.default_timeout_seconds {
            validate_timeout("Default timeout", timeout)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MAX_JOB_TIMEOUT_SECONDS;

    fn create(default_timeout_seconds: Option<u64>) -> CreateProject {
        CreateProject {
            namespace_id: Uuid::new_v4(),
            name: "web".to_string(),
            shared_runners_enabled: true,
            default_timeout_seconds,
        }
    }

    #[test]
    fn test_create_project_timeout_bounds() {
        assert!(create(None).validate().is_ok());
        assert!(create(Some(3600)).validate().is_ok());
        assert!(create(Some(0)).validate().is_err());
        assert!(create(Some(MAX_JOB_TIMEOUT_SECONDS + 1)).validate().is_err());
    }

    #[test]
    fn test_update_project_rejects_huge_timeout() {
        let update = UpdateProject {
            default_timeout_seconds: Some(100_000_000_000_000_000),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(UpdateProject::default().validate().is_ok());
    }
}
