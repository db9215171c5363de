//! Gantry HTTP Client
//!
//! A type-safe HTTP client for the Gantry orchestrator API, shared by the
//! CLI and the runner.
//!
//! # Example
//!
//! ```no_run
//! use gantry_client::OrchestratorClient;
//! use gantry_core::dto::pipeline::CreatePipeline;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!     let project_id = Uuid::new_v4();
//!
//!     let view = client
//!         .create_pipeline(
//!             project_id,
//!             CreatePipeline {
//!                 ref_name: "main".to_string(),
//!                 sha: "a1b2c3".to_string(),
//!                 variables: vec![],
//!                 user_id: Uuid::new_v4(),
//!                 source: Default::default(),
//!             },
//!         )
//!         .await?;
//!
//!     println!("Created pipeline: {}", view.pipeline.id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod pipelines;
mod projects;
mod quotas;
mod runners;
mod triggers;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use gantry_core::dto::job::JobPayload;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the Gantry orchestrator API
///
/// Methods are grouped by resource:
/// - Projects, definitions and members
/// - Pipelines and jobs
/// - Runner registration, polling and reports (require a runner token)
/// - Triggers and namespace quotas
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Sent as a bearer token on runner endpoints
    runner_token: Option<String>,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use gantry_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            runner_token: None,
        }
    }

    /// Use `token` to authenticate runner endpoints
    pub fn with_runner_token(mut self, token: impl Into<String>) -> Self {
        self.runner_token = Some(token.into());
        self
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the runner token, failing if none is configured
    fn runner_auth(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .runner_token
            .as_deref()
            .ok_or_else(|| ClientError::InvalidRequest("runner token not configured".into()))?;
        Ok(request.bearer_auth(token))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await.map(|_| ())
    }

    /// `None` for 204 No Content, otherwise the deserialized body
    async fn handle_optional_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        self.handle_response(response).await.map(Some)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::from_response(status.as_u16(), &error_text));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OrchestratorClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/");
        assert_eq!(client.url("/health"), "http://localhost:8080/health");
    }

    #[test]
    fn test_runner_endpoints_need_token() {
        let client = OrchestratorClient::new("http://localhost:8080");
        let request = client.client.post(client.url("/runners/heartbeat"));
        assert!(matches!(
            client.runner_auth(request),
            Err(ClientError::InvalidRequest(_))
        ));

        let client = client.with_runner_token("grt_abc");
        let request = client.client.post(client.url("/runners/heartbeat"));
        assert!(client.runner_auth(request).is_ok());
    }
}
