//! Generic supervisor pattern for retried, idempotent workflows.
//!
//! A supervisor manages one workflow task. It never stores a mutable status:
//! each invocation re-derives the current state from the append-only
//! attempt log and its success/failure facts, then decides whether to
//! declare success, give up, start a new attempt, or schedule a recheck.
//! Waiting is always expressed as a new queued invocation carrying an
//! explicit [`domain::SupervisorState`].
//!
//! - Domain types and pure derivations in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The supervisor engine in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
