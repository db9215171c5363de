//! Job DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{ArtifactsSpec, Job, JobOutcome};
use crate::domain::pipeline::Variable;

/// Job as shown to API consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    /// Pending with no runner able to pick it up
    pub stuck: bool,
}

/// Everything a runner needs to execute a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_id: Uuid,
    pub pipeline_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub stage: String,
    pub script: Vec<String>,
    pub timeout_seconds: u64,
    pub artifacts: Option<ArtifactsSpec>,
    /// Pipeline variables followed by the predefined `CI_*` ones
    pub variables: Vec<Variable>,
}

/// Final report from the runner that executed a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteJob {
    #[serde(flatten)]
    pub outcome: JobOutcome,
    pub exit_code: Option<i32>,
}
