//! Trigger DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::trigger::Trigger;
use crate::validation::{Validate, ValidationError, validate_variable_key};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrigger {
    pub owner_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTrigger {
    pub actor_id: Uuid,
    pub description: Option<String>,
}

/// Body for revoke and take-ownership
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TriggerActor {
    pub user_id: Uuid,
}

/// Starts a pipeline with a trigger token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireTrigger {
    pub token: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Validate for FireTrigger {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.ref_name.trim().is_empty() {
            return Err(ValidationError::new("Ref cannot be empty"));
        }

        for key in self.variables.keys() {
            validate_variable_key(key)?;
        }

        Ok(())
    }
}

/// Trigger as listed; the token itself is never shown again
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSummary {
    pub id: Uuid,
    pub project_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub description: Option<String>,
    pub token_preview: String,
    pub legacy: bool,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Trigger> for TriggerSummary {
    fn from(trigger: Trigger) -> Self {
        TriggerSummary {
            legacy: trigger.is_legacy(),
            valid: trigger.is_valid(),
            id: trigger.id,
            project_id: trigger.project_id,
            owner_id: trigger.owner_id,
            description: trigger.description,
            token_preview: trigger.token_preview,
            created_at: trigger.created_at,
            last_used_at: trigger.last_used_at,
        }
    }
}

/// Returned once at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCreated {
    #[serde(flatten)]
    pub trigger: TriggerSummary,
    pub token: String,
}
