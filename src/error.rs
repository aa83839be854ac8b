//! Core error taxonomy.
//!
//! Five categories cover every trait boundary in the crate. Clients keep
//! their wire-level detail in the message; callers branch on the variant.

use std::fmt::Display;

use thiserror::Error;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested entity does not exist anywhere we can see.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is fine but the current state forbids it; the message is
    /// user-actionable.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A downstream service could not be reached or answered garbage.
    /// Transient by definition.
    #[error("{service} unavailable: {message}")]
    ExternalServiceUnavailable {
        service: &'static str,
        message: String,
    },

    /// Caller-supplied data failed validation before any side effect.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(what: impl Display) -> Self {
        CoreError::NotFound(what.to_string())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        CoreError::PreconditionFailed(message.into())
    }

    pub fn unavailable(service: &'static str, err: impl Display) -> Self {
        CoreError::ExternalServiceUnavailable {
            service,
            message: err.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        CoreError::MalformedInput(message.into())
    }

    pub fn storage(err: impl Display) -> Self {
        CoreError::Storage(err.to_string())
    }

    /// Transient errors may be retried; everything else reflects the request
    /// or our own state and will not heal on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::ExternalServiceUnavailable { .. })
    }
}
