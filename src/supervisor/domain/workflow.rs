//! Workflow tasks: the root record each supervisor manages.

use super::{ParseWorkflowKindError, SupervisorDomainError, WorkflowTaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// The workflow domains built on the supervisor pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Deletes one stored file from cloud storage.
    FileDeletion,
    /// Scrubs personal data from one account.
    AccountAnonymization,
    /// Removes an account by orchestrating file deletion and anonymization.
    AccountDeletion,
    /// Delivers one email.
    EmailSend,
    /// Delivers one text message.
    SmsSend,
    /// Transcribes one audio recording.
    RecordingTranscription,
}

impl WorkflowKind {
    /// Every workflow kind, in storage order.
    pub const ALL: [Self; 6] = [
        Self::FileDeletion,
        Self::AccountAnonymization,
        Self::AccountDeletion,
        Self::EmailSend,
        Self::SmsSend,
        Self::RecordingTranscription,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileDeletion => "file_deletion",
            Self::AccountAnonymization => "account_anonymization",
            Self::AccountDeletion => "account_deletion",
            Self::EmailSend => "email_send",
            Self::SmsSend => "sms_send",
            Self::RecordingTranscription => "recording_transcription",
        }
    }
}

impl TryFrom<&str> for WorkflowKind {
    type Error = ParseWorkflowKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseWorkflowKindError(value.to_owned()))
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain key identifying what a workflow task is about (a file, an
/// account, a recording, a message).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowKey(String);

impl WorkflowKey {
    /// Longest key accepted by the persisted schema.
    pub const MAX_LEN: usize = 255;

    /// Creates a validated key.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorDomainError::EmptyKey`] for blank input or
    /// [`SupervisorDomainError::KeyTooLong`] when the trimmed key exceeds
    /// [`Self::MAX_LEN`] characters.
    pub fn new(value: impl Into<String>) -> Result<Self, SupervisorDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SupervisorDomainError::EmptyKey);
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(SupervisorDomainError::KeyTooLong { max: Self::MAX_LEN });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Creates a key from a domain UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Root record of one logical unit of supervised work. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTask {
    id: WorkflowTaskId,
    kind: WorkflowKind,
    key: WorkflowKey,
    input: Value,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted workflow task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedWorkflowTask {
    /// Persisted identifier.
    pub id: WorkflowTaskId,
    /// Persisted workflow kind.
    pub kind: WorkflowKind,
    /// Persisted domain key.
    pub key: WorkflowKey,
    /// Persisted kickoff input.
    pub input: Value,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl WorkflowTask {
    /// Creates a new workflow task.
    #[must_use]
    pub fn new(
        kind: WorkflowKind,
        key: WorkflowKey,
        input: Value,
        clock: &(impl Clock + ?Sized),
    ) -> Self {
        Self {
            id: WorkflowTaskId::new(),
            kind,
            key,
            input,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs a workflow task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedWorkflowTask) -> Self {
        Self {
            id: data.id,
            kind: data.kind,
            key: data.key,
            input: data.input,
            created_at: data.created_at,
        }
    }

    /// Returns the workflow task identifier.
    #[must_use]
    pub const fn id(&self) -> WorkflowTaskId {
        self.id
    }

    /// Returns the workflow kind.
    #[must_use]
    pub const fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Returns the domain key.
    #[must_use]
    pub const fn key(&self) -> &WorkflowKey {
        &self.key
    }

    /// Returns the kickoff input document.
    #[must_use]
    pub const fn input(&self) -> &Value {
        &self.input
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
