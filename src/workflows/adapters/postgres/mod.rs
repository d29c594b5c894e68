//! `PostgreSQL` adapter for transcription requests and responses.
//!
//! Accounts, files and recordings belong to the host application's schema,
//! so only the engine's own transcription records are stored here.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTranscriptionRepository, TranscriptionPgPool};
