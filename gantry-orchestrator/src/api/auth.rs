//! Runner authentication
//!
//! Runner endpoints carry the runner token as `Authorization: Bearer <token>`.

use axum::{extract::FromRequestParts, http::request::Parts};
use gantry_core::domain::runner::Runner;

use crate::api::error::ApiError;
use crate::service::runner_service;
use crate::state::AppState;

/// Raw runner token from the request
pub struct RunnerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for RunnerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Authorization header required".into()))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Unauthorized(
                "Authorization header malformed; should start with 'Bearer'".into(),
            )
        })?;

        Ok(RunnerToken(token.trim().to_string()))
    }
}

/// The runner that owns the request's token
pub struct AuthenticatedRunner(pub Runner);

impl FromRequestParts<AppState> for AuthenticatedRunner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RunnerToken(token) = RunnerToken::from_request_parts(parts, state).await?;
        let runner = runner_service::authenticate(state, &token).await?;
        Ok(AuthenticatedRunner(runner))
    }
}
