//! Project-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::domain::pipeline::PipelineDefinition;
use gantry_core::domain::project::{Membership, Project};
use gantry_core::dto::project::{CreateProject, SetMember, UpdateProject};
use uuid::Uuid;

impl OrchestratorClient {
    pub async fn create_project(&self, req: CreateProject) -> Result<Project> {
        let response = self
            .client
            .post(self.url("/projects"))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project> {
        let response = self
            .client
            .get(self.url(&format!("/projects/{}", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Partially update a project
    pub async fn update_project(&self, id: Uuid, req: UpdateProject) -> Result<Project> {
        let response = self
            .client
            .patch(self.url(&format!("/projects/{}", id)))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Replace the definition used for future pipelines
    pub async fn set_definition(&self, id: Uuid, definition: &PipelineDefinition) -> Result<Project> {
        let response = self
            .client
            .put(self.url(&format!("/projects/{}/definition", id)))
            .json(definition)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn set_member(&self, id: Uuid, req: SetMember) -> Result<Membership> {
        let response = self
            .client
            .put(self.url(&format!("/projects/{}/members", id)))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
