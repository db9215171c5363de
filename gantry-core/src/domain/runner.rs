//! Runner domain model
//!
//! Represents a runner that executes jobs from the orchestrator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A runner that can execute jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    /// Unique identifier for the runner
    pub id: Uuid,

    pub description: String,

    /// SHA-256 of the token issued at registration
    #[serde(skip)]
    pub token_hash: String,

    /// Which projects this runner may serve
    pub scope: RunnerScope,

    /// Tags this runner advertises
    pub tags: BTreeSet<String>,

    /// Whether this runner picks up jobs without tags
    pub run_untagged: bool,

    /// A paused runner receives no new jobs
    pub paused: bool,

    /// When this runner was first registered
    pub registered_at: DateTime<Utc>,

    /// Last heartbeat or job request
    pub contacted_at: Option<DateTime<Utc>>,
}

/// Which projects a runner may serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerScope {
    /// Any project that enables shared runners
    Shared,

    /// Only the listed projects
    Project { project_ids: BTreeSet<Uuid> },
}

impl RunnerScope {
    pub fn is_shared(&self) -> bool {
        matches!(self, RunnerScope::Shared)
    }
}

/// Derived status of a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    /// Runner has contacted the orchestrator recently
    Online,

    /// Runner hasn't sent a heartbeat recently
    Offline,

    /// Runner was paused by an operator
    Paused,
}

impl std::fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerStatus::Online => write!(f, "Online"),
            RunnerStatus::Offline => write!(f, "Offline"),
            RunnerStatus::Paused => write!(f, "Paused"),
        }
    }
}

impl Runner {
    /// Returns true when the last contact is within `offline_after`
    pub fn is_online(&self, now: DateTime<Utc>, offline_after: Duration) -> bool {
        self.contacted_at
            .map(|contacted| now - contacted <= offline_after)
            .unwrap_or(false)
    }

    pub fn status(&self, now: DateTime<Utc>, offline_after: Duration) -> RunnerStatus {
        if self.paused {
            RunnerStatus::Paused
        } else if self.is_online(now, offline_after) {
            RunnerStatus::Online
        } else {
            RunnerStatus::Offline
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn runner(tags: &[&str]) -> Runner {
        Runner {
            id: Uuid::new_v4(),
            description: "test runner".to_string(),
            token_hash: String::new(),
            scope: RunnerScope::Shared,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            run_untagged: true,
            paused: false,
            registered_at: Utc::now(),
            contacted_at: Some(Utc::now()),
        }
    }
}
