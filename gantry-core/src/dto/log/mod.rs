//! Trace DTOs for inter-service communication

use serde::{Deserialize, Serialize};

use crate::domain::job::JobStatus;
use crate::domain::log::LogEntry;

/// Trace batch sent from runner to orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendTrace {
    pub entries: Vec<LogEntry>,
}

/// Returned for every trace batch so the runner notices cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAck {
    pub job_status: JobStatus,
}
