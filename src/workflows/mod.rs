//! Business workflows: file deletion, account anonymization, account
//! deletion, email and text message delivery, and recording transcription.
//!
//! Each workflow plugs its domain checks into the generic supervisor and
//! serves the queue handlers its side effects name.
//!
//! - Business records and protocol helpers in [`domain`]
//! - Collaborator and transcription ports in [`ports`]
//! - In-memory and `PostgreSQL` adapters in [`adapters`]
//! - The workflows and the webhook receiver in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
