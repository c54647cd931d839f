//! Unified error taxonomy for the core.
//!
//! Every fallible core operation returns [`CoreError`]. Handlers map each
//! variant to an HTTP status plus a stable machine-readable code; storage
//! error details are logged server-side and never leak to clients.

use thiserror::Error;

use crate::task::{TaskAction, TaskStatus};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("action '{action}' is not valid while task is '{from}'")]
    InvalidTransition { from: TaskStatus, action: TaskAction },

    #[error("task was modified concurrently; reload and retry")]
    Conflict,

    #[error("storage failure")]
    Storage(#[source] rusqlite::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Conflict => "conflict",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Message safe to return to clients. Storage errors are redacted;
    /// the cause stays attached for logging via `source()`.
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage(_) => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e)
    }
}
