//! Errors raised by registered handlers.

use thiserror::Error;

/// Result type for handler invocations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Error returned while parsing a function name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown function: {0}")]
pub struct ParseHandlerIdError(pub String);

/// Failure of a handler invocation.
///
/// Only [`HandlerError::Infrastructure`] is worth retrying; the worker leaves
/// such tasks to lease expiry and completes the rest.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The function name is not registered.
    #[error(transparent)]
    UnknownFunction(#[from] ParseHandlerIdError),

    /// The payload does not have the shape the handler expects.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A persistence or collaborator failure that may clear on retry.
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),

    /// A broken invariant that must stop the task.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl HandlerError {
    /// Builds an invalid-payload error from any displayable cause.
    pub fn invalid_payload(err: impl std::fmt::Display) -> Self {
        Self::InvalidPayload(err.to_string())
    }

    /// Builds a retryable infrastructure error from any displayable cause.
    pub fn infrastructure(err: impl std::fmt::Display) -> Self {
        Self::Infrastructure(err.to_string())
    }

    /// Returns whether the task should be left for another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}
