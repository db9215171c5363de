//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::ServiceError;
use crate::store::StoreError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    StoreError(StoreError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::StoreError(err) => {
                tracing::error!("Store error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ServiceError::InvalidToken => ApiError::Unauthorized(err.to_string()),
            ServiceError::InsufficientPermission(msg) => ApiError::Forbidden(msg),
            ServiceError::InvalidTransition(e) => ApiError::Conflict(e.to_string()),
            ServiceError::InvalidState(msg) => ApiError::Conflict(msg),
            ServiceError::Validation(e) => ApiError::BadRequest(e.to_string()),
            ServiceError::Store(StoreError::Conflict(what)) => {
                ApiError::Conflict(format!("{} already exists", what))
            }
            ServiceError::Store(e) => ApiError::StoreError(e),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::error::TransitionError;
    use gantry_core::validation::ValidationError;
    use uuid::Uuid;

    fn status(err: ServiceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_service_errors_map_to_status_codes() {
        assert_eq!(
            status(ServiceError::not_found("job", Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(ServiceError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(ServiceError::InsufficientPermission("no".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(TransitionError::NotManual(Uuid::new_v4()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ValidationError::new("bad").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(StoreError::Corrupt("x".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
