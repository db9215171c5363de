//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gantry_core::domain::pipeline::Pipeline;
use gantry_core::dto::pipeline::{CreatePipeline, PipelineSummary, PipelineView};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::pipeline_service;
use crate::state::AppState;

/// POST /projects/{id}/pipelines
/// Create a pipeline from the project's definition
pub async fn create_pipeline(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<PipelineView>)> {
    tracing::info!("Creating pipeline for project {} on {}", project_id, req.ref_name);

    let view = pipeline_service::create_pipeline(&state, project_id, req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /projects/{id}/pipelines
pub async fn list_pipelines(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PipelineSummary>>> {
    tracing::debug!("Listing pipelines for project: {}", project_id);

    Ok(Json(
        pipeline_service::list_pipelines(&state, project_id).await?,
    ))
}

/// GET /pipelines/{id}
/// Pipeline with its latest jobs
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineView>> {
    tracing::debug!("Getting pipeline: {}", id);

    Ok(Json(pipeline_service::get_pipeline_view(&state, id).await?))
}

/// POST /pipelines/{id}/cancel
pub async fn cancel_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Canceling pipeline: {}", id);

    Ok(Json(pipeline_service::cancel_pipeline(&state, id).await?))
}

/// DELETE /pipelines/{id}
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    pipeline_service::delete_pipeline(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
