//! Project API Handlers
//!
//! HTTP endpoints for projects, their pipeline definition and members.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gantry_core::domain::pipeline::PipelineDefinition;
use gantry_core::domain::project::{Membership, Project};
use gantry_core::dto::project::{CreateProject, SetMember, UpdateProject};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::project_service;
use crate::state::AppState;

/// POST /projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    tracing::info!("Creating project: {}", req.name);

    let project = project_service::create_project(&state, req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    tracing::debug!("Getting project: {}", id);

    Ok(Json(project_service::get_project(&state, id).await?))
}

/// PATCH /projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProject>,
) -> ApiResult<Json<Project>> {
    Ok(Json(project_service::update_project(&state, id, req).await?))
}

/// PUT /projects/{id}/definition
/// Replace the pipeline definition used for new pipelines
pub async fn set_definition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(definition): Json<PipelineDefinition>,
) -> ApiResult<Json<Project>> {
    Ok(Json(
        project_service::set_definition(&state, id, definition).await?,
    ))
}

/// PUT /projects/{id}/members
pub async fn set_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetMember>,
) -> ApiResult<Json<Membership>> {
    Ok(Json(project_service::set_member(&state, id, req).await?))
}
