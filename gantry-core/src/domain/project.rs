//! Project and membership types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::pipeline::PipelineDefinition;

/// A project owns pipelines, triggers and project-scoped runners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    /// Namespace the project's minutes are billed to
    pub namespace_id: Uuid,
    pub name: String,
    pub shared_runners_enabled: bool,
    /// Structured CI configuration used for new pipelines
    pub definition: Option<PipelineDefinition>,
    /// Applied to jobs whose definition has no timeout
    pub default_timeout_seconds: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Access a user has on a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Guest = 10,
    Reporter = 20,
    Developer = 30,
    Maintainer = 40,
    Owner = 50,
}

impl AccessLevel {
    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            10 => Some(AccessLevel::Guest),
            20 => Some(AccessLevel::Reporter),
            30 => Some(AccessLevel::Developer),
            40 => Some(AccessLevel::Maintainer),
            50 => Some(AccessLevel::Owner),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Guest => "guest",
            AccessLevel::Reporter => "reporter",
            AccessLevel::Developer => "developer",
            AccessLevel::Maintainer => "maintainer",
            AccessLevel::Owner => "owner",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(AccessLevel::Guest),
            "reporter" => Ok(AccessLevel::Reporter),
            "developer" => Ok(AccessLevel::Developer),
            "maintainer" => Ok(AccessLevel::Maintainer),
            "owner" => Ok(AccessLevel::Owner),
            other => Err(format!("unknown access level '{}'", other)),
        }
    }
}

/// A user's access level on one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub access_level: AccessLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_levels_are_ordered() {
        assert!(AccessLevel::Maintainer > AccessLevel::Developer);
        assert!(AccessLevel::Reporter < AccessLevel::Developer);
        assert_eq!(AccessLevel::Owner.value(), 50);
        assert_eq!(AccessLevel::from_value(30), Some(AccessLevel::Developer));
        assert_eq!(AccessLevel::from_value(35), None);
    }
}
