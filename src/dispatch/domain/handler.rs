//! Closed enumeration of every function a worker may invoke.

use super::ParseHandlerIdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerId {
    /// Supervisor for one file deletion.
    SuperviseFileDeletion,
    /// Supervisor for one account anonymization.
    SuperviseAccountAnonymization,
    /// Root supervisor for account deletion.
    SuperviseAccountDeletion,
    /// Supervisor for one email.
    SuperviseEmailSend,
    /// Supervisor for one text message.
    SuperviseSmsSend,
    /// Supervisor for one recording transcription.
    SuperviseTranscription,
    /// Builds the storage provider input for a file deletion.
    FileDeleteBefore,
    /// Records a completed file deletion.
    FileDeleteSuccess,
    /// Records a failed file deletion.
    FileDeleteError,
    /// Renders an email for the mail provider.
    EmailBefore,
    /// Records a delivered email.
    EmailSuccess,
    /// Records a failed email.
    EmailError,
    /// Renders a text message for the SMS provider.
    SmsBefore,
    /// Records a delivered text message.
    SmsSuccess,
    /// Records a failed text message.
    SmsError,
    /// Builds the transcription provider request.
    TranscriptionBefore,
    /// Records the provider's correlation id for a transcription.
    TranscriptionSuccess,
    /// Records a rejected transcription request.
    TranscriptionError,
    /// Scrubs personal data from an account inside the database.
    AnonymizeAccount,
}

impl HandlerId {
    /// Every handler identifier; a registry must cover all of them.
    pub const ALL: [Self; 19] = [
        Self::SuperviseFileDeletion,
        Self::SuperviseAccountAnonymization,
        Self::SuperviseAccountDeletion,
        Self::SuperviseEmailSend,
        Self::SuperviseSmsSend,
        Self::SuperviseTranscription,
        Self::FileDeleteBefore,
        Self::FileDeleteSuccess,
        Self::FileDeleteError,
        Self::EmailBefore,
        Self::EmailSuccess,
        Self::EmailError,
        Self::SmsBefore,
        Self::SmsSuccess,
        Self::SmsError,
        Self::TranscriptionBefore,
        Self::TranscriptionSuccess,
        Self::TranscriptionError,
        Self::AnonymizeAccount,
    ];

    /// Returns the canonical function name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperviseFileDeletion => "supervise_file_deletion",
            Self::SuperviseAccountAnonymization => "supervise_account_anonymization",
            Self::SuperviseAccountDeletion => "supervise_account_deletion",
            Self::SuperviseEmailSend => "supervise_email_send",
            Self::SuperviseSmsSend => "supervise_sms_send",
            Self::SuperviseTranscription => "supervise_transcription",
            Self::FileDeleteBefore => "file_delete_before",
            Self::FileDeleteSuccess => "file_delete_success",
            Self::FileDeleteError => "file_delete_error",
            Self::EmailBefore => "email_before",
            Self::EmailSuccess => "email_success",
            Self::EmailError => "email_error",
            Self::SmsBefore => "sms_before",
            Self::SmsSuccess => "sms_success",
            Self::SmsError => "sms_error",
            Self::TranscriptionBefore => "transcription_before",
            Self::TranscriptionSuccess => "transcription_success",
            Self::TranscriptionError => "transcription_error",
            Self::AnonymizeAccount => "anonymize_account",
        }
    }
}

impl TryFrom<&str> for HandlerId {
    type Error = ParseHandlerIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| ParseHandlerIdError(value.to_owned()))
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
