//! Collaborator and transcription adapters.

pub mod memory;
pub mod postgres;
