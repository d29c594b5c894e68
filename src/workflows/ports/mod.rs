//! Port contracts for business collaborators and transcription records.

pub mod collaborators;
pub mod transcription;

pub use collaborators::{AccountDirectory, CollaboratorError, CollaboratorResult, RecordingLibrary};
pub use transcription::{
    TranscriptionRepository, TranscriptionRepositoryError, TranscriptionRepositoryResult,
};
