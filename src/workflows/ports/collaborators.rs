//! Boundaries to the business data the workflows act on.
//!
//! The engine never owns accounts, files or recordings. It reads them and
//! writes the few markers a workflow is responsible for through these ports.

use crate::dispatch::domain::HandlerError;
use crate::supervisor::services::SupervisorError;
use crate::workflows::domain::{AccountId, FileId, Recording, RecordingId, StoredFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for collaborator operations.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Account, file and personal-data access.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Returns whether the account exists.
    async fn account_exists(&self, id: AccountId) -> CollaboratorResult<bool>;

    /// Returns every file the account owns, deleted or not.
    async fn files_owned_by(&self, id: AccountId) -> CollaboratorResult<Vec<StoredFile>>;

    /// Finds a file by identifier.
    async fn find_file(&self, id: FileId) -> CollaboratorResult<Option<StoredFile>>;

    /// Marks a file as deleted from storage.
    ///
    /// Returns `false` when the file was already marked.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::UnknownFile`] when the file does not exist.
    async fn mark_file_deleted(&self, id: FileId, at: DateTime<Utc>) -> CollaboratorResult<bool>;

    /// Returns whether the account's personal data was scrubbed.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::UnknownAccount`] when the account does
    /// not exist.
    async fn is_anonymized(&self, id: AccountId) -> CollaboratorResult<bool>;

    /// Scrubs personal data and sets the anonymized marker.
    ///
    /// Returns `false` when the account was already anonymized.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::UnknownAccount`] when the account does
    /// not exist.
    async fn anonymize(&self, id: AccountId, at: DateTime<Utc>) -> CollaboratorResult<bool>;
}

/// Recording lookup and transcript storage.
#[async_trait]
pub trait RecordingLibrary: Send + Sync {
    /// Finds a recording by identifier.
    async fn find_recording(&self, id: RecordingId) -> CollaboratorResult<Option<Recording>>;

    /// Stores the transcript for a recording, replacing none that exists.
    ///
    /// Returns `false` when a transcript was already stored.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::UnknownRecording`] when the recording
    /// does not exist.
    async fn store_transcript(
        &self,
        id: RecordingId,
        text: &str,
        at: DateTime<Utc>,
    ) -> CollaboratorResult<bool>;
}

/// Errors returned by collaborator implementations.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The account was not found.
    #[error("account not found: {0}")]
    UnknownAccount(AccountId),

    /// The file was not found.
    #[error("file not found: {0}")]
    UnknownFile(FileId),

    /// The recording was not found.
    #[error("recording not found: {0}")]
    UnknownRecording(RecordingId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CollaboratorError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns whether retrying may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<CollaboratorError> for HandlerError {
    fn from(err: CollaboratorError) -> Self {
        if err.is_transient() {
            Self::infrastructure(err)
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

impl From<CollaboratorError> for SupervisorError {
    fn from(err: CollaboratorError) -> Self {
        Self::workflow(err)
    }
}
