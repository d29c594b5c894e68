//! In-memory adapters for tests and single-process deployments.

mod collaborators;
mod transcription;

pub use collaborators::{InMemoryAccountDirectory, InMemoryRecordingLibrary};
pub use transcription::InMemoryTranscriptionRepository;
