//! Trigger-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::dto::pipeline::PipelineView;
use gantry_core::dto::trigger::{
    CreateTrigger, FireTrigger, TriggerActor, TriggerCreated, TriggerSummary, UpdateTrigger,
};
use uuid::Uuid;

impl OrchestratorClient {
    /// Create a trigger; the token is only part of this response
    pub async fn create_trigger(&self, project_id: Uuid, req: CreateTrigger) -> Result<TriggerCreated> {
        let response = self
            .client
            .post(self.url(&format!("/projects/{}/triggers", project_id)))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn list_triggers(&self, project_id: Uuid) -> Result<Vec<TriggerSummary>> {
        let response = self
            .client
            .get(self.url(&format!("/projects/{}/triggers", project_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn update_trigger(&self, id: Uuid, req: UpdateTrigger) -> Result<TriggerSummary> {
        let response = self
            .client
            .patch(self.url(&format!("/triggers/{}", id)))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn revoke_trigger(&self, id: Uuid, actor: TriggerActor) -> Result<TriggerSummary> {
        self.trigger_action(id, "revoke", actor).await
    }

    pub async fn take_trigger_ownership(
        &self,
        id: Uuid,
        actor: TriggerActor,
    ) -> Result<TriggerSummary> {
        self.trigger_action(id, "take_ownership", actor).await
    }

    async fn trigger_action(
        &self,
        id: Uuid,
        action: &str,
        actor: TriggerActor,
    ) -> Result<TriggerSummary> {
        let response = self
            .client
            .post(self.url(&format!("/triggers/{}/{}", id, action)))
            .json(&actor)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Start a pipeline with a trigger token
    pub async fn fire_trigger(&self, project_id: Uuid, req: FireTrigger) -> Result<PipelineView> {
        let response = self
            .client
            .post(self.url(&format!("/projects/{}/trigger/pipeline", project_id)))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
