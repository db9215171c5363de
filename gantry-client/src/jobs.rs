//! Job-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::job::Job;
use gantry_core::domain::log::LogEntry;
use gantry_core::dto::job::{CompleteJob, JobView};
use gantry_core::dto::log::{AppendTrace, TraceAck};
use gantry_core::dto::runner::RunnerSummary;
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Job Actions
    // =============================================================================

    pub async fn get_job(&self, id: Uuid) -> Result<JobView> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn cancel_job(&self, id: Uuid) -> Result<Job> {
        self.job_action(id, "cancel").await
    }

    /// Retry a failed or canceled job, returning the new job
    pub async fn retry_job(&self, id: Uuid) -> Result<Job> {
        self.job_action(id, "retry").await
    }

    /// Start a manual job
    pub async fn play_job(&self, id: Uuid) -> Result<Job> {
        self.job_action(id, "play").await
    }

    async fn job_action(&self, id: Uuid, action: &str) -> Result<Job> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/{}", id, action)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Runners able to execute the job, best candidate first
    pub async fn candidate_runners(&self, id: Uuid) -> Result<Vec<RunnerSummary>> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/runners", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn get_trace(&self, id: Uuid) -> Result<Vec<LogEntry>> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/trace", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Download a job's artifact archive
    pub async fn download_artifact(&self, id: Uuid) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/artifacts", id)))
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // =============================================================================
    // Runner Reports
    // =============================================================================

    /// Append log entries to a job held by this runner
    ///
    /// The ack reports the job's current status; `canceled` means the runner
    /// should stop executing.
    pub async fn append_trace(&self, id: Uuid, entries: Vec<LogEntry>) -> Result<TraceAck> {
        let request = self
            .client
            .post(self.url(&format!("/jobs/{}/trace", id)))
            .json(&AppendTrace { entries });
        let response = self.runner_auth(request)?.send().await?;

        self.handle_response(response).await
    }

    /// Report the final outcome of a job held by this runner
    pub async fn complete_job(&self, id: Uuid, req: CompleteJob) -> Result<Job> {
        let request = self
            .client
            .post(self.url(&format!("/jobs/{}/complete", id)))
            .json(&req);
        let response = self.runner_auth(request)?.send().await?;

        self.handle_response(response).await
    }

    pub async fn upload_artifact(
        &self,
        id: Uuid,
        filename: &str,
        data: Vec<u8>,
        expire_in_seconds: Option<u64>,
    ) -> Result<Artifact> {
        let mut query = vec![("filename", filename.to_string())];
        if let Some(expire_in) = expire_in_seconds {
            query.push(("expire_in", expire_in.to_string()));
        }

        let request = self
            .client
            .put(self.url(&format!("/jobs/{}/artifacts", id)))
            .query(&query)
            .body(data);
        let response = self.runner_auth(request)?.send().await?;

        self.handle_response(response).await
    }
}
