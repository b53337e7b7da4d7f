// ── Core error types ──
//
// Every failure the adapter reports to a caller ends up as a
// `{status, message}` response. `CoreError::to_response` is the single
// place that mapping lives.

use serde_json::Value;
use thiserror::Error;

use crate::model::{Response, Status, ValueKind};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookup errors ────────────────────────────────────────────────
    #[error("{0}")]
    NotFound(String),

    // ── Request errors ───────────────────────────────────────────────
    #[error("{0}")]
    InvalidInput(String),

    #[error("Request type: {0} is not supported.")]
    InvalidVerb(String),

    // ── Handler errors ───────────────────────────────────────────────
    /// A handler replied with a non-success status; passed through verbatim.
    #[error("handler returned status {status}: {message}")]
    Handler { status: Status, message: Value },

    // ── Store errors ─────────────────────────────────────────────────
    #[error("cached value is a {cached} but the new value is a {received}")]
    TypeMismatch {
        cached: ValueKind,
        received: ValueKind,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NOT_EXIST,
            Self::InvalidInput(_) | Self::InvalidVerb(_) => Status::ERROR,
            Self::Internal(_) | Self::TypeMismatch { .. } => Status::INTERNAL_ERROR,
            Self::Handler { status, .. } => *status,
        }
    }

    /// Render as the uniform response shape.
    pub fn to_response(&self) -> Response {
        let message = match self {
            Self::Handler { message, .. } => message.clone(),
            other => Value::String(other.to_string()),
        };
        Response {
            status: self.status(),
            message,
        }
    }
}

impl From<CoreError> for Response {
    fn from(err: CoreError) -> Self {
        err.to_response()
    }
}
