//! Pipeline-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::domain::pipeline::Pipeline;
use gantry_core::dto::pipeline::{CreatePipeline, PipelineSummary, PipelineView};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// Create a pipeline from the project's definition
    ///
    /// The returned view carries the namespace quota status; an exceeded
    /// quota is a warning, not an error.
    pub async fn create_pipeline(&self, project_id: Uuid, req: CreatePipeline) -> Result<PipelineView> {
        let response = self
            .client
            .post(self.url(&format!("/projects/{}/pipelines", project_id)))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List pipelines of a project, newest first
    pub async fn list_pipelines(&self, project_id: Uuid) -> Result<Vec<PipelineSummary>> {
        let response = self
            .client
            .get(self.url(&format!("/projects/{}/pipelines", project_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a pipeline with its latest jobs
    pub async fn get_pipeline(&self, id: Uuid) -> Result<PipelineView> {
        let response = self
            .client
            .get(self.url(&format!("/pipelines/{}", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn cancel_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        let response = self
            .client
            .post(self.url(&format!("/pipelines/{}/cancel", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn delete_pipeline(&self, id: Uuid) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/pipelines/{}", id)))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
