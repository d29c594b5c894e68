//! Concrete workflows built on the generic supervisor.

mod account_deletion;
mod anonymization;
mod file_deletion;
mod notification;
mod support;
mod transcription;
mod webhook;

pub use account_deletion::{
    AccountDeletionInput, AccountDeletionStatus, AccountDeletionWorkflow, DeletionPhase,
};
pub use anonymization::{AnonymizationInput, AnonymizationWorkflow};
pub use file_deletion::{FileDeletionInput, FileDeletionWorkflow};
pub use notification::NotificationWorkflow;
pub use transcription::{TranscriptionInput, TranscriptionWorkflow};
pub use webhook::{TranscriptionWebhook, WebhookReceipt};
