//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod auth;
pub mod error;
pub mod events;
pub mod health;
pub mod job;
pub mod pipeline;
pub mod project;
pub mod quota;
pub mod runner;
pub mod trigger;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Project endpoints
        .route("/projects", post(project::create_project))
        .route("/projects/{id}", get(project::get_project))
        .route("/projects/{id}", patch(project::update_project))
        .route("/projects/{id}/definition", put(project::set_definition))
        .route("/projects/{id}/members", put(project::set_member))
        // Pipeline endpoints
        .route("/projects/{id}/pipelines", post(pipeline::create_pipeline))
        .route("/projects/{id}/pipelines", get(pipeline::list_pipelines))
        .route("/pipelines/{id}", get(pipeline::get_pipeline))
        .route("/pipelines/{id}", delete(pipeline::delete_pipeline))
        .route("/pipelines/{id}/cancel", post(pipeline::cancel_pipeline))
        // Job endpoints
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}/cancel", post(job::cancel_job))
        .route("/jobs/{id}/retry", post(job::retry_job))
        .route("/jobs/{id}/play", post(job::play_job))
        .route("/jobs/{id}/runners", get(job::list_candidate_runners))
        .route("/jobs/{id}/trace", get(job::get_trace))
        .route("/jobs/{id}/trace", post(job::append_trace))
        .route("/jobs/{id}/complete", post(job::complete_job))
        .route("/jobs/{id}/artifacts", get(job::download_artifact))
        .route("/jobs/{id}/artifacts", put(job::upload_artifact))
        // Runner endpoints
        .route("/runners", post(runner::register_runner))
        .route("/runners", get(runner::list_runners))
        .route("/runners/heartbeat", post(runner::runner_heartbeat))
        .route("/runners/jobs/request", post(runner::request_job))
        .route("/runners/{id}", get(runner::get_runner))
        .route("/runners/{id}", delete(runner::delete_runner))
        .route("/runners/{id}/pause", post(runner::pause_runner))
        .route("/runners/{id}/resume", post(runner::resume_runner))
        // Trigger endpoints
        .route("/projects/{id}/triggers", post(trigger::create_trigger))
        .route("/projects/{id}/triggers", get(trigger::list_triggers))
        .route("/projects/{id}/trigger/pipeline", post(trigger::fire_trigger))
        .route("/triggers/{id}", patch(trigger::update_trigger))
        .route("/triggers/{id}/revoke", post(trigger::revoke_trigger))
        .route("/triggers/{id}/take_ownership", post(trigger::take_ownership))
        // Quota endpoints
        .route("/namespaces/{id}/quota", get(quota::get_quota))
        .route("/namespaces/{id}/quota", put(quota::set_quota))
        // Event stream
        .route("/events", get(events::stream_events))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use gantry_core::dto::job::JobPayload;
    use gantry_core::dto::runner::RegisteredRunner;
    use serde_json::{Value, json};

    async fn serve() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(AppState::in_memory(Config::default()));
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve().await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_pipeline_round_trip_over_http() {
        let base = serve().await;
        let http = reqwest::Client::new();
        let user = uuid::Uuid::new_v4();

        let project: Value = http
            .post(format!("{}/projects", base))
            .json(&json!({ "namespace_id": uuid::Uuid::new_v4(), "name": "api" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let project_id = project["id"].as_str().unwrap().to_string();

        http.put(format!("{}/projects/{}/definition", base, project_id))
            .json(&json!({
                "stages": [{ "name": "build", "jobs": [{ "name": "compile", "script": ["make"] }] }]
            }))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
        http.put(format!("{}/projects/{}/members", base, project_id))
            .json(&json!({ "user_id": user, "access_level": "developer" }))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();

        let response = http
            .post(format!("{}/projects/{}/pipelines", base, project_id))
            .json(&json!({ "ref": "main", "sha": "abc", "user_id": user }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let pipeline: Value = response.json().await.unwrap();
        assert_eq!(pipeline["status"], "pending");

        let runner: RegisteredRunner = http
            .post(format!("{}/runners", base))
            .json(&json!({ "scope": { "type": "shared" } }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let unauthorized = http
            .post(format!("{}/runners/jobs/request", base))
            .bearer_auth("grt_nope")
            .send()
            .await
            .unwrap();
        assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

        let payload: JobPayload = http
            .post(format!("{}/runners/jobs/request", base))
            .bearer_auth(&runner.token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(payload.name, "compile");

        let empty = http
            .post(format!("{}/runners/jobs/request", base))
            .bearer_auth(&runner.token)
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), reqwest::StatusCode::NO_CONTENT);

        http.post(format!("{}/jobs/{}/complete", base, payload.job_id))
            .bearer_auth(&runner.token)
            .json(&json!({ "outcome": "success", "exit_code": 0 }))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();

        let view: Value = http
            .get(format!("{}/pipelines/{}", base, pipeline["id"].as_str().unwrap()))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["status"], "success");
        assert_eq!(view["jobs"][0]["status"], "success");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let base = serve().await;
        let response = reqwest::get(format!("{}/jobs/{}", base, uuid::Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }
}
