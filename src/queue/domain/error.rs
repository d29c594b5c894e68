//! Error types for queue domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing queue values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueDomainError {
    /// Task payloads must be JSON objects so handler names can be embedded.
    #[error("task payload must be a JSON object, found {0}")]
    PayloadNotObject(&'static str),

    /// Failure messages must carry some text.
    #[error("failure message must not be empty")]
    EmptyFailureMessage,
}

/// Error returned while parsing task kinds from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task kind: {0}")]
pub struct ParseTaskKindError(pub String);
