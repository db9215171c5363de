//! Service error type

use gantry_core::error::TransitionError;
use gantry_core::validation::ValidationError;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    /// Unknown, revoked or foreign token
    #[error("invalid token")]
    InvalidToken,

    #[error("{0}")]
    InsufficientPermission(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        ServiceError::NotFound { kind, id }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
