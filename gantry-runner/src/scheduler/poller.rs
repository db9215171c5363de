//! Job poller
//!
//! Requests jobs from the orchestrator while execution slots are free and
//! runs each one in its own task. A trace sender per job streams the buffered
//! output and watches the acknowledged status for cancellation.

use anyhow::{Context as AnyhowContext, Result, bail};
use gantry_core::domain::job::{ArtifactsSpec, JobOutcome, JobStatus};
use gantry_core::dto::job::JobPayload;
use gantry_client::{ClientError, OrchestratorClient};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::context::Context;
use crate::retry::Backoff;
use crate::service::{ExecutionOutcome, ExecutionService};

/// Job poller that continuously requests and executes jobs
pub struct JobPoller {
    config: Config,
    client: Arc<OrchestratorClient>,
    executor: Arc<dyn ExecutionService>,
    semaphore: Arc<Semaphore>,
}

impl JobPoller {
    pub fn new(
        config: Config,
        client: Arc<OrchestratorClient>,
        executor: Arc<dyn ExecutionService>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_jobs));
        Self {
            config,
            client,
            executor,
            semaphore,
        }
    }

    /// Starts the polling loop
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting job poller (interval: {:?}, max parallel jobs: {})",
            self.config.poll_interval, self.config.max_parallel_jobs
        );

        let _heartbeat_handle = self.start_heartbeat_loop();

        let mut interval = time::interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            debug!("Polling for jobs");

            match self.poll_once().await {
                Ok(started) => {
                    if started > 0 {
                        info!("Started {} job(s) this cycle", started);
                    }
                }
                Err(e) if token_rejected(&e) => {
                    error!("Runner token was rejected, register the runner again");
                    return Err(e);
                }
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                }
            }
        }
    }

    /// Requests jobs until the queue is empty or every slot is busy
    async fn poll_once(&self) -> Result<usize> {
        let mut started = 0;

        loop {
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                debug!("Max parallel jobs reached");
                break;
            };

            let payload = self
                .client
                .request_job()
                .await
                .context("Failed to request a job")?;

            let Some(payload) = payload else {
                debug!("No jobs available");
                break;
            };

            info!(
                "Claimed job {} ({}/{}) of pipeline {}",
                payload.job_id, payload.stage, payload.name, payload.pipeline_id
            );
            self.spawn_job_task(payload, permit);
            started += 1;
        }

        Ok(started)
    }

    fn spawn_job_task(
        &self,
        payload: JobPayload,
        permit: OwnedSemaphorePermit,
    ) -> tokio::task::JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let executor = Arc::clone(&self.executor);
        let config = self.config.clone();

        tokio::spawn(async move {
            let job_id = payload.job_id;
            if let Err(e) = Self::execute_job(payload, config, client, executor).await {
                error!("Failed to execute job {}: {:#}", job_id, e);
            }
            drop(permit);
        })
    }

    async fn execute_job(
        payload: JobPayload,
        config: Config,
        client: Arc<OrchestratorClient>,
        executor: Arc<dyn ExecutionService>,
    ) -> Result<()> {
        let job_id = payload.job_id;
        let context = Context::new(payload, &config.builds_dir);

        let trace_sender = Self::spawn_trace_sender(
            Arc::clone(&context),
            Arc::clone(&client),
            config.log_send_interval,
        );

        let outcome = executor.execute(Arc::clone(&context)).await;

        if let ExecutionOutcome::Finished(report) = &outcome {
            if report.outcome == JobOutcome::Success {
                if let Some(spec) = &context.payload.artifacts {
                    Self::upload_artifact(&context, &client, spec).await;
                }
            }
        }

        trace_sender.abort();
        Self::flush_trace(&context, &client).await;

        if let Err(e) = tokio::fs::remove_dir_all(&context.workspace).await {
            debug!("Failed to remove workspace for job {}: {}", job_id, e);
        }

        match outcome {
            ExecutionOutcome::Finished(_) if context.is_canceled() => {
                info!("Job {} was canceled, skipping completion", job_id);
            }
            ExecutionOutcome::Finished(report) => {
                let job = Backoff::standard()
                    .retry("Job completion", || client.complete_job(job_id, report))
                    .await?;
                info!("Job {} finished with status {}", job_id, job.status);
            }
            ExecutionOutcome::Canceled => {
                info!("Job {} canceled", job_id);
            }
        }

        Ok(())
    }

    async fn upload_artifact(context: &Context, client: &OrchestratorClient, spec: &ArtifactsSpec) {
        let job_id = context.payload.job_id;

        let result = async {
            let (filename, path) = artifact_file(&context.workspace, spec)?;
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let size = data.len();
            client
                .upload_artifact(job_id, &filename, data, spec.expire_in_seconds)
                .await
                .context("Upload rejected")?;
            anyhow::Ok((filename, size))
        }
        .await;

        match result {
            Ok((filename, size)) => {
                context.log_info(format!("Uploaded artifact {} ({} bytes)", filename, size));
            }
            Err(e) => {
                warn!("Failed to upload artifact for job {}: {:#}", job_id, e);
                context.log_warning(format!("Failed to upload artifact: {:#}", e));
            }
        }
    }

    /// Sends whatever is still buffered
    async fn flush_trace(context: &Context, client: &OrchestratorClient) {
        while context.has_logs() {
            let entries = context.drain_logs();
            match client.append_trace(context.payload.job_id, entries).await {
                Ok(ack) if ack.job_status == JobStatus::Canceled => context.cancel(),
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to send final trace: {:#}", e);
                    break;
                }
            }
        }
    }

    /// Streams the trace on an interval
    ///
    /// An empty batch is still sent so a silent job notices cancellation.
    fn spawn_trace_sender(
        context: Arc<Context>,
        client: Arc<OrchestratorClient>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let job_id = context.payload.job_id;
            let mut ticker = time::interval(interval);

            loop {
                ticker.tick().await;

                let entries = context.drain_logs();
                debug!("Sending {} trace entries for job {}", entries.len(), job_id);

                match client.append_trace(job_id, entries).await {
                    Ok(ack) if ack.job_status == JobStatus::Canceled => {
                        info!("Job {} was canceled by the orchestrator", job_id);
                        context.cancel();
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Failed to send trace for job {}: {:#}", job_id, e);
                    }
                }
            }
        })
    }

    fn start_heartbeat_loop(&self) -> tokio::task::JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let heartbeat_interval = self.config.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = time::interval(heartbeat_interval);

            loop {
                ticker.tick().await;

                debug!("Sending heartbeat");

                match client.send_heartbeat().await {
                    Ok(_) => {}
                    Err(e) if e.is_unauthorized() => {
                        error!("Heartbeat rejected: the runner token is no longer valid");
                    }
                    Err(e) => warn!("Failed to send heartbeat: {:#}", e),
                }
            }
        })
    }
}

fn token_rejected(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_unauthorized)
}

/// Resolves the artifact path inside the workspace
fn artifact_file(workspace: &Path, spec: &ArtifactsSpec) -> Result<(String, PathBuf)> {
    let relative = Path::new(&spec.path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("Artifact path {} must stay inside the workspace", spec.path);
    }

    let filename = relative
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Artifact path {} has no file name", spec.path))?;

    Ok((filename, workspace.join(relative)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(path: &str) -> ArtifactsSpec {
        ArtifactsSpec {
            path: path.to_string(),
            expire_in_seconds: None,
        }
    }

    #[test]
    fn test_token_rejected_sees_through_context() {
        let rejected = Err::<(), _>(ClientError::api_error(401, "invalid token"))
            .context("Failed to request a job")
            .unwrap_err();
        assert!(token_rejected(&rejected));

        let unavailable = Err::<(), _>(ClientError::api_error(503, "unavailable"))
            .context("Failed to request a job")
            .unwrap_err();
        assert!(!token_rejected(&unavailable));
    }

    #[test]
    fn test_artifact_file_inside_workspace() {
        let workspace = Path::new("/builds/42");
        let (filename, path) = artifact_file(workspace, &spec("target/release/app.tar")).unwrap();

        assert_eq!(filename, "app.tar");
        assert_eq!(path, PathBuf::from("/builds/42/target/release/app.tar"));
    }

    #[test]
    fn test_artifact_file_rejects_escapes() {
        let workspace = Path::new("/builds/42");

        assert!(artifact_file(workspace, &spec("../secret")).is_err());
        assert!(artifact_file(workspace, &spec("/etc/passwd")).is_err());
        assert!(artifact_file(workspace, &spec("")).is_err());
    }
}
