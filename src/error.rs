//! Service error types and HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::storage::StoreError;

/// Message returned for every internal failure. The cause is only logged.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing parameter. Raised before any store access.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("store failure: {0}")]
    Internal(#[from] StoreError),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// JSON error body: `{ "message": ... }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Internal(_) | ServiceError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ServiceError::Validation(message) | ServiceError::NotFound(message) => message,
            ServiceError::Internal(err) => {
                tracing::error!(error = %err, "Request failed with store error");
                INTERNAL_MESSAGE.to_string()
            }
            ServiceError::Task(err) => {
                tracing::error!(error = %err, "Request task failed");
                INTERNAL_MESSAGE.to_string()
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
