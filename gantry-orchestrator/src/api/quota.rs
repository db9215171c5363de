//! Quota API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use gantry_core::dto::quota::{QuotaView, SetQuotaLimit};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::quota_service;
use crate::state::AppState;

/// GET /namespaces/{id}/quota
pub async fn get_quota(
    State(state): State<AppState>,
    Path(namespace_id): Path<Uuid>,
) -> ApiResult<Json<QuotaView>> {
    Ok(Json(quota_service::check(&state, namespace_id).await?))
}

/// PUT /namespaces/{id}/quota
pub async fn set_quota(
    State(state): State<AppState>,
    Path(namespace_id): Path<Uuid>,
    Json(req): Json<SetQuotaLimit>,
) -> ApiResult<Json<QuotaView>> {
    tracing::info!("Setting quota for namespace: {}", namespace_id);

    Ok(Json(
        quota_service::set_limit(&state, namespace_id, req).await?,
    ))
}
