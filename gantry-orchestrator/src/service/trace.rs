//! Trace Service
//!
//! Append-only job logs streamed by the runner holding the job.

use gantry_core::domain::log::LogEntry;
use gantry_core::domain::runner::Runner;
use gantry_core::dto::log::TraceAck;
use gantry_core::validation::validate_log_entries;
use uuid::Uuid;

use crate::service::{Result, job_service};
use crate::state::AppState;

/// Append a batch of log entries
///
/// The ack carries the job's current status so the runner can notice a
/// cancellation.
pub async fn append(
    state: &AppState,
    runner: &Runner,
    job_id: Uuid,
    entries: Vec<LogEntry>,
) -> Result<TraceAck> {
    validate_log_entries(&entries)?;

    let job = job_service::job_held_by(state, runner, job_id).await?;

    if !entries.is_empty() {
        state.store.append_trace(job_id, &entries).await?;
        tracing::debug!("Appended {} trace entries to job {}", entries.len(), job_id);
    }

    Ok(TraceAck {
        job_status: job.status,
    })
}

/// Full trace of a job, oldest entry first
pub async fn get_trace(state: &AppState, job_id: Uuid) -> Result<Vec<LogEntry>> {
    job_service::get_job(state, job_id).await?;
    Ok(state.store.get_trace(job_id).await?)
}
