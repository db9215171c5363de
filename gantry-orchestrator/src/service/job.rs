//! Job Service
//!
//! Operator actions on single jobs (cancel, retry, play) and the reports a
//! runner sends for the job it holds.

use chrono::Utc;
use gantry_core::domain::job::{Job, JobOutcome, JobStatus};
use gantry_core::domain::project::Project;
use gantry_core::domain::runner::Runner;
use gantry_core::dto::job::{CompleteJob, JobView};
use gantry_core::error::TransitionError;
use gantry_core::event::Event;
use gantry_core::feature::Feature;
use gantry_core::matching;
use gantry_core::processing;
use std::collections::HashSet;
use uuid::Uuid;

use crate::service::{Result, ServiceError, pipeline_service, project_service, quota_service};
use crate::state::AppState;

/// Get a job by ID
pub async fn get_job(state: &AppState, id: Uuid) -> Result<Job> {
    state
        .store
        .get_job(id)
        .await?
        .ok_or(ServiceError::not_found("job", id))
}

pub async fn get_job_view(state: &AppState, id: Uuid) -> Result<JobView> {
    let job = get_job(state, id).await?;
    let project = project_service::get_project(state, job.project_id).await?;
    job_view(state, &project, job).await
}

/// A pending job is stuck when no online runner could pick it up
pub(crate) async fn job_view(state: &AppState, project: &Project, job: Job) -> Result<JobView> {
    let stuck = if job.status == JobStatus::Pending {
        let now = Utc::now();
        let offline_after = state.config.runner_offline_after_chrono();
        let runners: Vec<Runner> = state
            .store
            .list_runners()
            .await?
            .into_iter()
            .filter(|r| r.is_online(now, offline_after))
            .collect();
        matching::candidates(&runners, project, &job, &HashSet::new()).is_empty()
    } else {
        false
    };

    Ok(JobView { job, stuck })
}

/// Writes a transition with compare-and-swap on the previous status
///
/// Publishes the status change when the write wins. Returns false when the
/// stored job no longer had status `from`.
pub(crate) async fn write_transition(state: &AppState, job: &Job, from: JobStatus) -> Result<bool> {
    if !state.store.compare_and_swap_job(job, from).await? {
        return Ok(false);
    }

    tracing::debug!("Job {} ({}): {} -> {}", job.id, job.name, from, job.status);
    state.events.publish(Event::JobStatusChanged {
        job_id: job.id,
        pipeline_id: job.pipeline_id,
        from,
        to: job.status,
    });

    Ok(true)
}

/// Cancel a pending or running job
pub async fn cancel_job(state: &AppState, id: Uuid) -> Result<Job> {
    let job = get_job(state, id).await?;
    let _guard = state.locks.lock(job.pipeline_id).await;
    let job = get_job(state, id).await?;

    if !job.status.is_active() {
        return Err(TransitionError::InvalidTransition {
            job_id: job.id,
            from: job.status,
            to: JobStatus::Canceled,
        }
        .into());
    }

    let Some(job) = cancel_current(state, job).await? else {
        return Err(ServiceError::InvalidState(format!(
            "Job {} finished while being canceled",
            id
        )));
    };

    tracing::info!("Job canceled: {}", job.id);

    pipeline_service::process_locked(state, job.pipeline_id).await?;
    Ok(job)
}

const CANCEL_ATTEMPTS: usize = 5;

/// Cancels `job`, re-reading it whenever a concurrent write wins
///
/// Returns None once the stored job is no longer cancelable.
pub(crate) async fn cancel_current(state: &AppState, mut job: Job) -> Result<Option<Job>> {
    for _ in 0..CANCEL_ATTEMPTS {
        if job.retried || !job.status.is_cancelable() {
            return Ok(None);
        }

        let mut canceled = job.clone();
        let from = canceled.transition(JobStatus::Canceled, Utc::now())?;
        if write_transition(state, &canceled, from).await? {
            if from == JobStatus::Running {
                quota_service::record_job_usage(state, &canceled).await?;
            }
            return Ok(Some(canceled));
        }

        job = get_job(state, job.id).await?;
    }

    Err(ServiceError::InvalidState(format!(
        "Job {} kept changing while being canceled",
        job.id
    )))
}

/// Retry a failed or canceled job
///
/// Returns the new job, which starts `pending`.
pub async fn retry_job(state: &AppState, id: Uuid) -> Result<Job> {
    let job = get_job(state, id).await?;
    let _guard = state.locks.lock(job.pipeline_id).await;
    let original = get_job(state, id).await?;

    let now = Utc::now();
    let retried = original.retry(now)?;

    if !state
        .store
        .record_retry(original.id, original.status, &retried)
        .await?
    {
        return Err(ServiceError::InvalidState(format!(
            "Job {} changed while being retried",
            original.id
        )));
    }

    state.events.publish(Event::JobStatusChanged {
        job_id: retried.id,
        pipeline_id: retried.pipeline_id,
        from: JobStatus::Created,
        to: JobStatus::Pending,
    });

    if state.config.features.is_enabled(Feature::RetryResetsSkipped) {
        let jobs = state.store.list_jobs(original.pipeline_id).await?;
        for decision in processing::reset_skipped_after(&jobs, original.stage_idx) {
            let Some(job) = jobs.iter().find(|j| j.id == decision.job_id) else {
                continue;
            };
            let mut reset = job.clone();
            let from = reset.transition(decision.to, now)?;
            write_transition(state, &reset, from).await?;
        }
    }

    tracing::info!("Job {} retried as {}", original.id, retried.id);

    pipeline_service::process_locked(state, original.pipeline_id).await?;
    Ok(retried)
}

/// Play a manual job
pub async fn play_job(state: &AppState, id: Uuid) -> Result<Job> {
    let job = get_job(state, id).await?;
    let _guard = state.locks.lock(job.pipeline_id).await;
    let mut job = get_job(state, id).await?;

    if !job.is_manual() {
        return Err(TransitionError::NotManual(job.id).into());
    }

    if job.retried {
        return Err(TransitionError::AlreadyRetried(job.id).into());
    }

    if !matches!(job.status, JobStatus::Manual | JobStatus::Skipped) {
        return Err(TransitionError::InvalidTransition {
            job_id: job.id,
            from: job.status,
            to: JobStatus::Pending,
        }
        .into());
    }

    let from = job.transition(JobStatus::Pending, Utc::now())?;
    if !write_transition(state, &job, from).await? {
        return Err(ServiceError::InvalidState(format!(
            "Job {} changed while being played",
            job.id
        )));
    }

    tracing::info!("Manual job played: {}", job.id);

    pipeline_service::process_locked(state, job.pipeline_id).await?;
    Ok(job)
}

/// Loads a job and checks that `runner` is executing it
pub(crate) async fn job_held_by(state: &AppState, runner: &Runner, job_id: Uuid) -> Result<Job> {
    let job = get_job(state, job_id).await?;

    if job.runner_id != Some(runner.id) {
        return Err(ServiceError::InsufficientPermission(format!(
            "Runner {} does not hold job {}",
            runner.id, job_id
        )));
    }

    Ok(job)
}

/// Record the final outcome reported by the runner holding the job
///
/// A job that was canceled while running keeps its `canceled` status.
pub async fn complete_job(
    state: &AppState,
    runner: &Runner,
    job_id: Uuid,
    req: CompleteJob,
) -> Result<Job> {
    let job = job_held_by(state, runner, job_id).await?;
    let _guard = state.locks.lock(job.pipeline_id).await;
    let mut job = get_job(state, job_id).await?;

    if job.status == JobStatus::Canceled {
        tracing::info!("Job {} was canceled, ignoring reported outcome", job.id);
        return Ok(job);
    }

    let from = job.transition(req.outcome.status(), Utc::now())?;
    job.exit_code = req.exit_code;
    job.failure_reason = match req.outcome {
        JobOutcome::Success => None,
        JobOutcome::Failed { reason } => Some(reason),
    };

    if !write_transition(state, &job, from).await? {
        let current = get_job(state, job_id).await?;
        tracing::info!("Job {} is {}, ignoring reported outcome", job_id, current.status);
        return Ok(current);
    }

    tracing::info!("Job {} finished: {}", job.id, job.status);

    quota_service::record_job_usage(state, &job).await?;
    pipeline_service::process_locked(state, job.pipeline_id).await?;

    Ok(job)
}
