//! Runner DTOs
//!
//! Data transfer objects for runner-related operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::runner::{Runner, RunnerScope, RunnerStatus};
use crate::validation::{Validate, ValidationError, validate_tags};

fn default_true() -> bool {
    true
}

/// Request to register a runner with the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRunner {
    #[serde(default)]
    pub description: String,

    pub scope: RunnerScope,

    /// Tags this runner advertises
    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default = "default_true")]
    pub run_untagged: bool,
}

impl Validate for RegisterRunner {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_tags(&self.tags)?;

        if let RunnerScope::Project { project_ids } = &self.scope {
            if project_ids.is_empty() {
                return Err(ValidationError::new(
                    "Project runners must be associated with at least one project",
                ));
            }
        }

        if !self.run_untagged && self.tags.is_empty() {
            return Err(ValidationError::new(
                "A runner without tags must be allowed to run untagged jobs",
            ));
        }

        Ok(())
    }
}

/// Returned once at registration; the token is not retrievable later
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredRunner {
    pub id: Uuid,
    pub token: String,
}

/// Summary information about a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSummary {
    pub id: Uuid,

    pub description: String,

    pub scope: RunnerScope,

    pub tags: BTreeSet<String>,

    pub run_untagged: bool,

    /// When this runner was first registered
    pub registered_at: DateTime<Utc>,

    /// Last time this runner contacted the orchestrator
    pub contacted_at: Option<DateTime<Utc>>,

    /// Current status of the runner
    pub status: RunnerStatus,

    /// Number of jobs the runner is executing
    pub running_jobs: usize,
}

impl RunnerSummary {
    pub fn new(runner: Runner, status: RunnerStatus, running_jobs: usize) -> Self {
        RunnerSummary {
            id: runner.id,
            description: runner.description,
            scope: runner.scope,
            tags: runner.tags,
            run_untagged: runner.run_untagged,
            registered_at: runner.registered_at,
            contacted_at: runner.contacted_at,
            status,
            running_jobs,
        }
    }
}
