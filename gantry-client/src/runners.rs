//! Runner-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::dto::job::JobPayload;
use gantry_core::dto::runner::{RegisterRunner, RegisteredRunner, RunnerSummary};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Runner Registration & Lifecycle
    // =============================================================================

    /// Register a runner with the orchestrator
    ///
    /// The returned token is shown only once; pass it to
    /// [`OrchestratorClient::with_runner_token`] for the runner endpoints.
    ///
    /// # Example
    /// ```no_run
    /// # use gantry_client::OrchestratorClient;
    /// # use gantry_core::domain::runner::RunnerScope;
    /// # use gantry_core::dto::runner::RegisterRunner;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// let registered = client
    ///     .register_runner(RegisterRunner {
    ///         description: "build-01".to_string(),
    ///         scope: RunnerScope::Shared,
    ///         tags: ["docker".to_string()].into(),
    ///         run_untagged: true,
    ///     })
    ///     .await?;
    /// let client = client.with_runner_token(registered.token);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn register_runner(&self, req: RegisterRunner) -> Result<RegisteredRunner> {
        let response = self
            .client
            .post(self.url("/runners"))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Send a heartbeat to the orchestrator
    ///
    /// Keeps the runner online. Call this well within the orchestrator's
    /// offline timeout.
    pub async fn send_heartbeat(&self) -> Result<()> {
        let request = self.client.post(self.url("/runners/heartbeat"));
        let response = self.runner_auth(request)?.send().await?;

        self.handle_empty_response(response).await
    }

    /// Ask for the next matching job
    ///
    /// Returns `None` when nothing is waiting for this runner.
    pub async fn request_job(&self) -> Result<Option<JobPayload>> {
        let request = self.client.post(self.url("/runners/jobs/request"));
        let response = self.runner_auth(request)?.send().await?;

        let payload: Option<JobPayload> = self.handle_optional_response(response).await?;
        if let Some(payload) = &payload {
            tracing::debug!("Received job {} ({})", payload.job_id, payload.name);
        }
        Ok(payload)
    }

    // =============================================================================
    // Runner Administration
    // =============================================================================

    pub async fn list_runners(&self) -> Result<Vec<RunnerSummary>> {
        let response = self.client.get(self.url("/runners")).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_runner(&self, id: Uuid) -> Result<RunnerSummary> {
        let response = self
            .client
            .get(self.url(&format!("/runners/{}", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn pause_runner(&self, id: Uuid) -> Result<RunnerSummary> {
        let response = self
            .client
            .post(self.url(&format!("/runners/{}/pause", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn resume_runner(&self, id: Uuid) -> Result<RunnerSummary> {
        let response = self
            .client
            .post(self.url(&format!("/runners/{}/resume", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Deregister a runner; jobs it still holds are failed
    pub async fn delete_runner(&self, id: Uuid) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/runners/{}", id)))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
