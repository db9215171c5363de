//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Each service handles operations for a specific domain entity; every
//! function takes the shared [`AppState`](crate::state::AppState).

pub mod artifact;
pub mod error;
pub mod job;
pub mod maintenance;
pub mod pipeline;
pub mod project;
pub mod quota;
pub mod runner;
pub mod token;
pub mod trace;
pub mod trigger;

// Re-export for convenience
pub use artifact as artifact_service;
pub use error::{Result, ServiceError};
pub use job as job_service;
pub use maintenance as maintenance_service;
pub use pipeline as pipeline_service;
pub use project as project_service;
pub use quota as quota_service;
pub use runner as runner_service;
pub use trace as trace_service;
pub use trigger as trigger_service;

#[cfg(test)]
pub(crate) mod testing;
