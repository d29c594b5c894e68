//! Durable task store and lease-based dequeue.
//!
//! Workers claim at most one task per call. A claim is recorded as a lease
//! that expires after a fixed window; a task is available again once every
//! lease on it has expired without a completion fact. The queue carries no
//! business knowledge and never retries on its own:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Queue operations in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
