//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quizzer_core::StoreError;
use quizzer_execution::ExecutionError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine error.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// The request body could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The server is draining and takes no new work.
    #[error("server is shutting down")]
    ShuttingDown,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Execution(e) => match e {
                ExecutionError::NotFound { .. } | ExecutionError::Store(StoreError::NotFound { .. }) => {
                    StatusCode::NOT_FOUND
                }
                ExecutionError::Forbidden(_) => StatusCode::FORBIDDEN,
                ExecutionError::InvalidState(_) | ExecutionError::AlreadyJoined(_) => {
                    StatusCode::CONFLICT
                }
                ExecutionError::Protocol(_) => StatusCode::BAD_REQUEST,
                ExecutionError::CodeExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                ExecutionError::Closed(_) => StatusCode::GONE,
                ExecutionError::Store(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Execution(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
