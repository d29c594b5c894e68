//! Cueflow: durable task queue and supervised workflow engine.
//!
//! This crate provides the asynchronous backbone of a language-learning
//! backend. Every side effect (sending mail, deleting stored files,
//! scrubbing personal data, transcribing recordings) runs as a supervised
//! workflow on top of a lease-based work queue.
//!
//! # Architecture
//!
//! Cueflow follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and collaborators
//! - **Adapters**: In-memory and `PostgreSQL` implementations of ports
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`queue`]: Task store and lease-based dequeue
//! - [`supervisor`]: Generic attempt/fact supervisor with retry and backoff
//! - [`dispatch`]: Closed handler enumeration and registry
//! - [`workflows`]: File deletion, anonymization, account deletion,
//!   notifications and transcription
//! - [`engine`]: Composition root and kickoff entry points
//! - [`worker`]: In-process reference worker

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod queue;
pub mod supervisor;
pub mod telemetry;
pub mod worker;
pub mod workflows;
