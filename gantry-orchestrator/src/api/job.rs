//! Job API Handlers
//!
//! HTTP endpoints for job actions, traces and artifacts. Report endpoints
//! (`POST /jobs/{id}/trace`, `/complete`, `PUT /jobs/{id}/artifacts`) require
//! the token of the runner holding the job.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::job::Job;
use gantry_core::domain::log::LogEntry;
use gantry_core::dto::job::{CompleteJob, JobView};
use gantry_core::dto::log::{AppendTrace, TraceAck};
use gantry_core::dto::runner::RunnerSummary;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AuthenticatedRunner;
use crate::api::error::ApiResult;
use crate::service::{artifact_service, job_service, runner_service, trace_service};
use crate::state::AppState;

// =============================================================================
// Job Actions
// =============================================================================

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobView>> {
    tracing::debug!("Getting job: {}", id);

    Ok(Json(job_service::get_job_view(&state, id).await?))
}

/// POST /jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Canceling job: {}", id);

    Ok(Json(job_service::cancel_job(&state, id).await?))
}

/// POST /jobs/{id}/retry
/// Returns the new job
pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    tracing::info!("Retrying job: {}", id);

    let job = job_service::retry_job(&state, id).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// POST /jobs/{id}/play
pub async fn play_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Playing manual job: {}", id);

    Ok(Json(job_service::play_job(&state, id).await?))
}

/// GET /jobs/{id}/runners
/// Runners able to pick up the job, best candidate first
pub async fn list_candidate_runners(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RunnerSummary>>> {
    Ok(Json(runner_service::match_job(&state, id).await?))
}

// =============================================================================
// Runner Reports
// =============================================================================

/// POST /jobs/{id}/complete
pub async fn complete_job(
    State(state): State<AppState>,
    AuthenticatedRunner(runner): AuthenticatedRunner,
    Path(id): Path<Uuid>,
    Json(req): Json<CompleteJob>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Runner {} completing job {}", runner.id, id);

    Ok(Json(job_service::complete_job(&state, &runner, id, req).await?))
}

/// POST /jobs/{id}/trace
/// Append log entries; the ack reports the current job status
pub async fn append_trace(
    State(state): State<AppState>,
    AuthenticatedRunner(runner): AuthenticatedRunner,
    Path(id): Path<Uuid>,
    Json(req): Json<AppendTrace>,
) -> ApiResult<Json<TraceAck>> {
    Ok(Json(
        trace_service::append(&state, &runner, id, req.entries).await?,
    ))
}

/// GET /jobs/{id}/trace
pub async fn get_trace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    tracing::debug!("Getting trace for job: {}", id);

    Ok(Json(trace_service::get_trace(&state, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: String,
    pub expire_in: Option<u64>,
}

/// PUT /jobs/{id}/artifacts?filename=...&expire_in=...
/// The request body is the raw archive
pub async fn upload_artifact(
    State(state): State<AppState>,
    AuthenticatedRunner(runner): AuthenticatedRunner,
    Path(id): Path<Uuid>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Artifact>)> {
    let artifact = artifact_service::upload(
        &state,
        &runner,
        id,
        params.filename,
        body.to_vec(),
        params.expire_in,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(artifact)))
}

/// GET /jobs/{id}/artifacts
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (artifact, data) = artifact_service::download(&state, id).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.filename),
        ),
    ];

    Ok((headers, data))
}
