//! Runner API Handlers
//!
//! HTTP endpoints for runner registration, administration and job polling.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gantry_core::dto::runner::{RegisterRunner, RegisteredRunner, RunnerSummary};
use uuid::Uuid;

use crate::api::auth::RunnerToken;
use crate::api::error::ApiResult;
use crate::service::runner_service;
use crate::state::AppState;

// =============================================================================
// Runner Registration & Lifecycle
// =============================================================================

/// POST /runners
/// Register a runner; the token is only returned here
pub async fn register_runner(
    State(state): State<AppState>,
    Json(req): Json<RegisterRunner>,
) -> ApiResult<(StatusCode, Json<RegisteredRunner>)> {
    tracing::info!("Registering runner: {}", req.description);

    let registered = runner_service::register_runner(&state, req).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// POST /runners/heartbeat
/// Keeps the calling runner marked as online
pub async fn runner_heartbeat(
    State(state): State<AppState>,
    RunnerToken(token): RunnerToken,
) -> ApiResult<StatusCode> {
    runner_service::heartbeat(&state, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /runners/jobs/request
/// 200 with a job payload, or 204 when nothing matches
pub async fn request_job(
    State(state): State<AppState>,
    RunnerToken(token): RunnerToken,
) -> ApiResult<Response> {
    match runner_service::request_job(&state, &token).await? {
        Some(payload) => Ok(Json(payload).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

// =============================================================================
// Runner Administration
// =============================================================================

/// GET /runners
pub async fn list_runners(State(state): State<AppState>) -> ApiResult<Json<Vec<RunnerSummary>>> {
    tracing::debug!("Listing all runners");

    Ok(Json(runner_service::list_runners(&state).await?))
}

/// GET /runners/{id}
pub async fn get_runner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunnerSummary>> {
    tracing::debug!("Getting runner: {}", id);

    Ok(Json(runner_service::get_runner_summary(&state, id).await?))
}

/// POST /runners/{id}/pause
pub async fn pause_runner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunnerSummary>> {
    Ok(Json(runner_service::pause_runner(&state, id).await?))
}

/// POST /runners/{id}/resume
pub async fn resume_runner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunnerSummary>> {
    Ok(Json(runner_service::resume_runner(&state, id).await?))
}

/// DELETE /runners/{id}
/// Deregister a runner, failing the jobs it holds
pub async fn delete_runner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deregistering runner: {}", id);

    runner_service::deregister_runner(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
