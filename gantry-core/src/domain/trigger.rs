//! Pipeline trigger types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A token that lets its holder start pipelines for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub project_id: Uuid,
    /// `None` for legacy triggers created before ownership existed
    pub owner_id: Option<Uuid>,
    pub description: Option<String>,
    #[serde(skip)]
    pub token_hash: String,
    /// Last four characters of the token
    pub token_preview: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Trigger {
    pub fn is_legacy(&self) -> bool {
        self.owner_id.is_none()
    }

    /// Whether the token can still start pipelines
    pub fn is_valid(&self) -> bool {
        !self.revoked
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == Some(user_id)
    }
}
