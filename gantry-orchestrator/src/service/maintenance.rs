//! Maintenance Service
//!
//! Periodic sweep that cleans up after runners that vanished or overran:
//! jobs of offline runners and timed-out jobs are failed, expired artifacts
//! are deleted.

use chrono::{DateTime, Utc};
use gantry_core::domain::job::FailureReason;
use std::collections::HashMap;

use crate::service::{Result, artifact_service, runner_service};
use crate::state::AppState;

/// What a single sweep changed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub orphaned_jobs: usize,
    pub timed_out_jobs: usize,
    pub expired_artifacts: u64,
}

pub async fn run_once(state: &AppState, now: DateTime<Utc>) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    let offline_after = state.config.runner_offline_after_chrono();
    let grace = state.config.timeout_grace_chrono();

    let online: HashMap<_, _> = state
        .store
        .list_runners()
        .await?
        .into_iter()
        .map(|runner| (runner.id, runner.is_online(now, offline_after)))
        .collect();

    for job in state.store.list_running_jobs().await? {
        let runner_online = job
            .runner_id
            .and_then(|id| online.get(&id).copied())
            .unwrap_or(false);

        let reason = if !runner_online {
            FailureReason::RunnerSystemFailure
        } else if job.timed_out(now, grace) {
            FailureReason::ExecutionTimeout
        } else {
            continue;
        };

        if runner_service::fail_job(state, job.id, reason).await? {
            match reason {
                FailureReason::ExecutionTimeout => report.timed_out_jobs += 1,
                _ => report.orphaned_jobs += 1,
            }
        }
    }

    report.expired_artifacts = artifact_service::sweep_expired(state).await?;

    Ok(report)
}

/// Runs [`run_once`] every `maintenance_interval` until the task is dropped
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.maintenance_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match run_once(&state, Utc::now()).await {
                Ok(report) if report != SweepReport::default() => {
                    tracing::info!(
                        "Maintenance: {} orphaned, {} timed out, {} artifacts expired",
                        report.orphaned_jobs,
                        report.timed_out_jobs,
                        report.expired_artifacts
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Maintenance sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::job_service;
    use chrono::Duration;
    use gantry_core::domain::job::JobStatus;
    use gantry_core::domain::pipeline::PipelineStatus;

    use crate::service::pipeline_service;
    use crate::service::testing::TestEnv;

    #[tokio::test]
    async fn test_nothing_to_do() {
        let env = TestEnv::new().await;
        env.create_pipeline().await;
        let (_, token) = env.runner(&[]).await;
        env.claim(&token).await;

        let report = run_once(&env.state, Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_offline_runner_jobs_fail() {
        let env = TestEnv::new().await;
        let view = env.create_pipeline().await;
        let (_, token) = env.runner(&[]).await;
        let payload = env.claim(&token).await;

        let later = Utc::now() + Duration::minutes(10);
        let report = run_once(&env.state, later).await.unwrap();
        assert_eq!(report.orphaned_jobs, 1);

        let job = job_service::get_job(&env.state, payload.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason, Some(FailureReason::RunnerSystemFailure));

        let pipeline = pipeline_service::get_pipeline(&env.state, view.pipeline.id)
            .await
            .unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Failed);
    }

    #[tokio::test]
    async fn test_timed_out_job_fails() {
        let env = TestEnv::new().await;
        env.create_pipeline().await;
        let (_, token) = env.runner(&[]).await;
        let payload = env.claim(&token).await;

        let mut job = job_service::get_job(&env.state, payload.job_id).await.unwrap();
        job.timeout_seconds = 1;
        job.started_at = Some(Utc::now() - Duration::minutes(5));
        env.state.store.save_job(&job).await.unwrap();

        let report = run_once(&env.state, Utc::now()).await.unwrap();
        assert_eq!(report.timed_out_jobs, 1);

        let job = job_service::get_job(&env.state, payload.job_id).await.unwrap();
        assert_eq!(job.failure_reason, Some(FailureReason::ExecutionTimeout));
    }

    #[tokio::test]
    async fn test_out_of_range_timeout_does_not_stop_sweep() {
        let env = TestEnv::new().await;
        env.create_pipeline().await;
        let (_, token) = env.runner(&[]).await;
        let payload = env.claim(&token).await;

        let mut job = job_service::get_job(&env.state, payload.job_id).await.unwrap();
        job.timeout_seconds = 100_000_000_000_000_000;
        env.state.store.save_job(&job).await.unwrap();
        env.backdate_start(payload.job_id, 3600).await;

        let report = run_once(&env.state, Utc::now()).await.unwrap();
        assert_eq!(report.timed_out_jobs, 0);

        let job = job_service::get_job(&env.state, payload.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }
}
