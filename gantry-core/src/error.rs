//! Lifecycle errors shared by every service that mutates jobs.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::job::JobStatus;

/// A requested status change that the job lifecycle graph does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {job_id} cannot be retried while {status}")]
    NotRetryable { job_id: Uuid, status: JobStatus },

    #[error("job {0} has already been retried")]
    AlreadyRetried(Uuid),

    #[error("job {0} is not a manual action")]
    NotManual(Uuid),
}
