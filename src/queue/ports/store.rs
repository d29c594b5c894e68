//! Storage port for queued tasks, leases, completions, and error records.

use crate::queue::domain::{Lease, QueueErrorRecord, QueueTask, QueueTaskId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type QueueStoreResult<T> = Result<T, QueueStoreError>;

/// Task store contract.
///
/// Implementations must make [`TaskStore::claim_next_available`] exclusive:
/// two concurrent claims never return the same task.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueStoreError::DuplicateTask`] when the identifier is
    /// already present.
    async fn insert(&self, task: &QueueTask) -> QueueStoreResult<()>;

    /// Claims the oldest available task by `(scheduled_at, id)`.
    ///
    /// On success a lease expiring at `now + lease_duration` has been
    /// recorded. Returns `None` when nothing is available.
    async fn claim_next_available(
        &self,
        now: DateTime<Utc>,
        lease_duration: Duration,
    ) -> QueueStoreResult<Option<(QueueTask, Lease)>>;

    /// Records a completion fact if none exists yet.
    ///
    /// Returns `true` when this call inserted the fact and `false` when the
    /// task was already complete.
    ///
    /// # Errors
    ///
    /// Returns [`QueueStoreError::NotFound`] when the task does not exist.
    async fn insert_completion(
        &self,
        task_id: QueueTaskId,
        completed_at: DateTime<Utc>,
    ) -> QueueStoreResult<bool>;

    /// Appends an error record.
    async fn insert_error(&self, record: &QueueErrorRecord) -> QueueStoreResult<()>;

    /// Finds a task by identifier.
    async fn find_by_id(&self, id: QueueTaskId) -> QueueStoreResult<Option<QueueTask>>;

    /// Returns every lease ever granted on the task, oldest first.
    async fn leases_for(&self, id: QueueTaskId) -> QueueStoreResult<Vec<Lease>>;

    /// Returns every error recorded against the task, oldest first.
    async fn errors_for(&self, id: QueueTaskId) -> QueueStoreResult<Vec<QueueErrorRecord>>;

    /// Returns whether a completion fact exists for the task.
    async fn is_completed(&self, id: QueueTaskId) -> QueueStoreResult<bool>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum QueueStoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate queue task identifier: {0}")]
    DuplicateTask(QueueTaskId),

    /// The task was not found.
    #[error("queue task not found: {0}")]
    NotFound(QueueTaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueueStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
