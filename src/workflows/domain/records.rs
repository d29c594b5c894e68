//! Business records owned by collaborators and read by workflows.

use super::{AccountId, FileId, RecordingId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file held in cloud storage on behalf of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// File identifier.
    pub id: FileId,
    /// Owning account.
    pub account_id: AccountId,
    /// Storage location understood by the storage provider.
    pub location: String,
    /// When deletion from storage was confirmed.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredFile {
    /// Returns whether the file is gone from storage.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Personal data held for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    /// Account identifier.
    pub id: AccountId,
    /// Contact email.
    pub email: Option<String>,
    /// Name shown to other learners.
    pub display_name: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// When personal data was scrubbed.
    pub anonymized_at: Option<DateTime<Utc>>,
}

impl AccountProfile {
    /// Creates a profile with contact details.
    #[must_use]
    pub fn new(id: AccountId, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email: Some(email.into()),
            display_name: Some(display_name.into()),
            phone: None,
            anonymized_at: None,
        }
    }

    /// Returns whether personal data was scrubbed.
    #[must_use]
    pub const fn is_anonymized(&self) -> bool {
        self.anonymized_at.is_some()
    }
}

/// An audio recording awaiting or carrying a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// Recording identifier.
    pub id: RecordingId,
    /// Owning account.
    pub account_id: AccountId,
    /// Where the provider can fetch the audio.
    pub audio_location: String,
    /// Stored transcript text.
    pub transcript: Option<String>,
}

impl Recording {
    /// Returns whether a transcript is stored.
    #[must_use]
    pub const fn is_transcribed(&self) -> bool {
        self.transcript.is_some()
    }
}
