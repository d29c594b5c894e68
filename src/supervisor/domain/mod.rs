//! Domain model for supervised workflows.
//!
//! Everything here is pure: fact derivation, the decision table, backoff
//! arithmetic, and the run-count tripwire can all be exercised without
//! storage.

mod attempt;
mod backoff;
mod decision;
mod error;
mod facts;
mod ids;
mod policy;
mod state;
mod workflow;

pub use attempt::{Attempt, AttemptOutcome, AttemptRecord, FactInsert};
pub use backoff::{Backoff, duration_from_secs};
pub use decision::{Decision, decide};
pub use error::{ParseWorkflowKindError, SupervisorDomainError};
pub use facts::{FactSnapshot, KeyStatus};
pub use ids::{AttemptId, WorkflowTaskId};
pub use policy::{ExhaustionPolicy, RetryPolicy};
pub use state::SupervisorState;
pub use workflow::{PersistedWorkflowTask, WorkflowKey, WorkflowKind, WorkflowTask};
