//! Domain model for queued work items, leases, and completion facts.

mod error;
mod ids;
mod lease;
mod task;

pub use error::{ParseTaskKindError, QueueDomainError};
pub use ids::{LeaseId, QueueErrorId, QueueTaskId};
pub use lease::{Completion, Lease, QueueErrorRecord, is_available};
pub use task::{PersistedQueueTask, QueueTask, TaskKind};
