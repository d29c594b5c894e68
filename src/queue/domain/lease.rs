//! Leases, completion facts, and queue-level error records.

use super::{LeaseId, QueueErrorId, QueueTask, QueueTaskId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A time-bounded claim on a task by one worker. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Lease identifier.
    pub id: LeaseId,
    /// Claimed task.
    pub task_id: QueueTaskId,
    /// When the claim was made.
    pub leased_at: DateTime<Utc>,
    /// When the claim stops excluding other workers.
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// Creates a lease on `task_id` starting at `now`.
    #[must_use]
    pub fn grant(task_id: QueueTaskId, now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            id: LeaseId::new(),
            task_id,
            leased_at: now,
            expires_at: now + duration,
        }
    }

    /// Returns whether the lease still excludes other claimants at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Terminal fact for a raw task. At most one per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Completed task.
    pub task_id: QueueTaskId,
    /// When the completion was recorded.
    pub completed_at: DateTime<Utc>,
}

/// Observability record of a worker failure. Does not affect availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueErrorRecord {
    /// Error record identifier.
    pub id: QueueErrorId,
    /// Task the failure relates to, when known.
    pub task_id: Option<QueueTaskId>,
    /// Failure description supplied by the worker.
    pub message: String,
    /// When the failure was recorded.
    pub created_at: DateTime<Utc>,
}

impl QueueErrorRecord {
    /// Creates an error record stamped at `now`.
    #[must_use]
    pub fn new(task_id: Option<QueueTaskId>, message: String, now: DateTime<Utc>) -> Self {
        Self {
            id: QueueErrorId::new(),
            task_id,
            message,
            created_at: now,
        }
    }
}

/// Returns whether `task` may be claimed at `now`.
///
/// A task is available iff it is due, has no completion fact, and no lease
/// on it is still active.
#[must_use]
pub fn is_available(
    task: &QueueTask,
    leases: &[Lease],
    completed: bool,
    now: DateTime<Utc>,
) -> bool {
    task.is_due(now) && !completed && !leases.iter().any(|lease| lease.is_active(now))
}
