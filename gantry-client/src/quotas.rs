//! Namespace quota endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::dto::quota::{QuotaView, SetQuotaLimit};
use uuid::Uuid;

impl OrchestratorClient {
    pub async fn get_quota(&self, namespace_id: Uuid) -> Result<QuotaView> {
        let response = self
            .client
            .get(self.url(&format!("/namespaces/{}/quota", namespace_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Set the CI minute limit; `None` or `0` removes it
    pub async fn set_quota(&self, namespace_id: Uuid, limit_minutes: Option<u64>) -> Result<QuotaView> {
        let response = self
            .client
            .put(self.url(&format!("/namespaces/{}/quota", namespace_id)))
            .json(&SetQuotaLimit { limit_minutes })
            .send()
            .await?;

        self.handle_response(response).await
    }
}
