//! Business records, identifiers, and pure protocol helpers for the
//! concrete workflows.

mod ids;
mod notification;
mod records;
mod signature;
mod transcription;

pub use ids::{AccountId, FileId, MessageId, RecordingId};
pub use notification::{Channel, NotificationRequest};
pub use records::{AccountProfile, Recording, StoredFile};
pub use signature::{SignatureError, SignatureHeader, sign, verify_signature};
pub use transcription::{
    CallbackBodyError, ProviderTranscript, TranscriptionRequest, TranscriptionResponse,
    callback_request_id, parse_transcript,
};
