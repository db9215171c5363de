//! Job artifact types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Artifact metadata; the blob itself is stored alongside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub job_id: Uuid,
    pub filename: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub expire_at: Option<DateTime<Utc>>,
}

impl Artifact {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.map(|at| at <= now).unwrap_or(false)
    }
}
