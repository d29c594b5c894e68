//! Repository port for transcription requests and webhook responses.

use crate::dispatch::domain::HandlerError;
use crate::supervisor::{domain::AttemptId, services::SupervisorError};
use crate::workflows::domain::{TranscriptionRequest, TranscriptionResponse};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for transcription repository operations.
pub type TranscriptionRepositoryResult<T> = Result<T, TranscriptionRepositoryError>;

/// Storage for the two correlated records of a transcription attempt.
///
/// Both records are keyed by attempt and written with insert-or-ignore
/// semantics: the first write wins and later writes report `false`.
#[async_trait]
pub trait TranscriptionRepository: Send + Sync {
    /// Stores the request sent for an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TranscriptionRepositoryError::DuplicateProviderRequest`]
    /// when another attempt already holds the provider correlation id.
    async fn record_request(
        &self,
        request: &TranscriptionRequest,
    ) -> TranscriptionRepositoryResult<bool>;

    /// Finds the request sent for an attempt.
    async fn request_for_attempt(
        &self,
        attempt_id: AttemptId,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionRequest>>;

    /// Finds a request by the provider's correlation id.
    async fn request_by_provider_id(
        &self,
        provider_request_id: &str,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionRequest>>;

    /// Stores the callback received for an attempt.
    async fn record_response(
        &self,
        response: &TranscriptionResponse,
    ) -> TranscriptionRepositoryResult<bool>;

    /// Finds the callback received for an attempt.
    async fn response_for_attempt(
        &self,
        attempt_id: AttemptId,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionResponse>>;
}

/// Errors returned by transcription repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TranscriptionRepositoryError {
    /// The provider correlation id is already bound to another attempt.
    #[error("provider request {0} is already recorded for another attempt")]
    DuplicateProviderRequest(String),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TranscriptionRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<TranscriptionRepositoryError> for HandlerError {
    fn from(err: TranscriptionRepositoryError) -> Self {
        match err {
            TranscriptionRepositoryError::Persistence(_) => Self::infrastructure(err),
            TranscriptionRepositoryError::DuplicateProviderRequest(_) => {
                Self::Fatal(err.to_string())
            }
        }
    }
}

impl From<TranscriptionRepositoryError> for SupervisorError {
    fn from(err: TranscriptionRepositoryError) -> Self {
        Self::workflow(err)
    }
}
