//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant is reported over HTTP.

use crate::config::ConfigError;
use attendance_core::LedgerError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A ledger operation was refused or failed.
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// JSON body returned for every failed request.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    /// Stable machine-readable error class, e.g. `duplicate_attendance`.
    pub kind: String,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Ledger(LedgerError::Validation(_)) | ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "validation")
            }
            ApiError::Ledger(LedgerError::SessionNotFound(_)) => {
                (StatusCode::NOT_FOUND, "session_not_found")
            }
            ApiError::Ledger(LedgerError::DuplicateAttendance { .. }) => {
                (StatusCode::CONFLICT, "duplicate_attendance")
            }
            ApiError::Ledger(LedgerError::Unavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "persistence_unavailable")
            }
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Request failed: {:?}", self);
                "An unexpected internal error occurred".to_string()
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                warn!("Storage unavailable: {:?}", self);
                "Storage is temporarily unavailable, please retry".to_string()
            }
            _ => self.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                message,
                kind: kind.to_string(),
            }),
        )
            .into_response()
    }
}
