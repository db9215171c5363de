//! Outbound lifecycle events

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::JobStatus;
use crate::domain::pipeline::PipelineStatus;
use crate::domain::quota::QuotaStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    JobStatusChanged {
        job_id: Uuid,
        pipeline_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
    PipelineStatusChanged {
        pipeline_id: Uuid,
        project_id: Uuid,
        from: PipelineStatus,
        to: PipelineStatus,
    },
    QuotaThresholdCrossed {
        namespace_id: Uuid,
        status: QuotaStatus,
        consumed_minutes: u64,
        limit_minutes: Option<u64>,
    },
}

impl Event {
    /// Name used for the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            Event::JobStatusChanged { .. } => "job_status_changed",
            Event::PipelineStatusChanged { .. } => "pipeline_status_changed",
            Event::QuotaThresholdCrossed { .. } => "quota_threshold_crossed",
        }
    }
}
