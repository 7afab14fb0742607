//! Execution error taxonomy.

use quizzer_core::{ParticipantId, StoreError};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the execution engine.
///
/// Handler-level errors are reported to the originating connection only and
/// never terminate the session.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Unknown session code or participant id.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of thing that was looked up.
        entity: &'static str,
        /// The id that was not found.
        id: String,
    },
    /// A non-host connection attempted a host-only action.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The current phase does not permit this transition.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Unrecognized message type or malformed payload.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// No free join code could be drawn.
    #[error("no free join code after {attempts} attempts")]
    CodeExhausted {
        /// Number of draws attempted.
        attempts: u32,
    },
    /// A participant with this id is already in the session.
    #[error("already joined: {0}")]
    AlreadyJoined(ParticipantId),
    /// Collaborator store failure during session creation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The session actor has stopped.
    #[error("session {0} is closed")]
    Closed(String),
}

impl ExecutionError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::Store(StoreError::NotFound { .. }) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::CodeExhausted { .. } => "CODE_EXHAUSTED",
            Self::AlreadyJoined(_) => "ALREADY_JOINED",
            Self::Store(_) => "STORE_ERROR",
            Self::Closed(_) => "SESSION_CLOSED",
        }
    }

    /// Shorthand for an unknown execution code.
    pub fn execution_not_found(code: &str) -> Self {
        Self::NotFound {
            entity: "execution",
            id: code.to_owned(),
        }
    }

    /// Payload sent to the offending connection.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        }
    }
}

/// Wire shape of an error: `{"error": {"code": ..., "message": ...}}`.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorPayload {
    /// Error details.
    pub error: ErrorDetail,
}

/// Code and human-readable message.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Result alias for execution operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExecutionError::execution_not_found("123456").code(), "NOT_FOUND");
        assert_eq!(ExecutionError::Forbidden("x".into()).code(), "FORBIDDEN");
        assert_eq!(ExecutionError::InvalidState("x".into()).code(), "INVALID_STATE");
        assert_eq!(ExecutionError::Protocol("x".into()).code(), "PROTOCOL_ERROR");
        assert_eq!(ExecutionError::CodeExhausted { attempts: 100 }.code(), "CODE_EXHAUSTED");
        assert_eq!(
            ExecutionError::AlreadyJoined(ParticipantId::from("p1")).code(),
            "ALREADY_JOINED"
        );
        assert_eq!(ExecutionError::Closed("1".into()).code(), "SESSION_CLOSED");
    }

    #[test]
    fn store_errors_map_by_kind() {
        let missing = ExecutionError::from(StoreError::NotFound {
            entity: "quiz",
            id: "q".into(),
        });
        assert_eq!(missing.code(), "NOT_FOUND");
        assert_eq!(missing.to_string(), "quiz not found: q");

        let down = ExecutionError::from(StoreError::Unavailable("db down".into()));
        assert_eq!(down.code(), "STORE_ERROR");
    }

    #[test]
    fn payload_shape() {
        let err = ExecutionError::Forbidden("only the host can start the quiz".into());
        let json = serde_json::to_value(err.to_payload()).unwrap();
        assert_eq!(json["error"]["code"], "FORBIDDEN");
        assert_eq!(
            json["error"]["message"],
            "forbidden: only the host can start the quiz"
        );
    }
}
