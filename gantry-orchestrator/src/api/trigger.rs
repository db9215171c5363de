//! Trigger API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gantry_core::dto::pipeline::PipelineView;
use gantry_core::dto::trigger::{
    CreateTrigger, FireTrigger, TriggerActor, TriggerCreated, TriggerSummary, UpdateTrigger,
};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::trigger_service;
use crate::state::AppState;

/// POST /projects/{id}/triggers
pub async fn create_trigger(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTrigger>,
) -> ApiResult<(StatusCode, Json<TriggerCreated>)> {
    tracing::info!("Creating trigger for project: {}", project_id);

    let created = trigger_service::create_trigger(&state, project_id, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /projects/{id}/triggers
pub async fn list_triggers(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TriggerSummary>>> {
    Ok(Json(
        trigger_service::list_triggers(&state, project_id).await?,
    ))
}

/// PATCH /triggers/{id}
pub async fn update_trigger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTrigger>,
) -> ApiResult<Json<TriggerSummary>> {
    Ok(Json(trigger_service::update_trigger(&state, id, req).await?))
}

/// POST /triggers/{id}/revoke
pub async fn revoke_trigger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TriggerActor>,
) -> ApiResult<Json<TriggerSummary>> {
    tracing::info!("Revoking trigger: {}", id);

    Ok(Json(trigger_service::revoke_trigger(&state, id, req).await?))
}

/// POST /triggers/{id}/take_ownership
pub async fn take_ownership(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TriggerActor>,
) -> ApiResult<Json<TriggerSummary>> {
    Ok(Json(trigger_service::take_ownership(&state, id, req).await?))
}

/// POST /projects/{id}/trigger/pipeline
/// Start a pipeline with a trigger token
pub async fn fire_trigger(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<FireTrigger>,
) -> ApiResult<(StatusCode, Json<PipelineView>)> {
    tracing::info!("Trigger fired for project {} on {}", project_id, req.ref_name);

    let view = trigger_service::fire(&state, project_id, req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}
