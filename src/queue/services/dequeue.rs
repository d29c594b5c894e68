//! Queue contract consumed by workers and by supervisors that schedule work.

use crate::queue::{
    domain::{Lease, QueueDomainError, QueueErrorRecord, QueueTask, QueueTaskId, TaskKind},
    ports::{QueueStoreError, TaskStore},
};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Lease window granted to a worker on claim, in seconds.
pub const DEFAULT_LEASE_SECS: i64 = 300;

/// Service-level errors for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] QueueDomainError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] QueueStoreError),
}

/// Result type for queue service operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue service over type-erased store and clock.
pub type SharedQueueService = QueueService<dyn TaskStore, dyn Clock + Send + Sync>;

/// Lease-based work queue.
pub struct QueueService<S, C>
where
    S: TaskStore + ?Sized,
    C: Clock + Send + Sync + ?Sized,
{
    store: Arc<S>,
    clock: Arc<C>,
    lease_duration: Duration,
}

impl<S, C> Clone for QueueService<S, C>
where
    S: TaskStore + ?Sized,
    C: Clock + Send + Sync + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            lease_duration: self.lease_duration,
        }
    }
}

impl<S, C> QueueService<S, C>
where
    S: TaskStore + ?Sized,
    C: Clock + Send + Sync + ?Sized,
{
    /// Creates a queue service with the default five-minute lease.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            store,
            clock,
            lease_duration: Duration::seconds(DEFAULT_LEASE_SECS),
        }
    }

    /// Overrides the lease window granted on claim.
    #[must_use]
    pub fn with_lease_duration(mut self, lease_duration: Duration) -> Self {
        self.lease_duration = lease_duration;
        self
    }

    /// Returns the lease window granted on claim.
    #[must_use]
    pub const fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Enqueues a task of `kind` that becomes due at `scheduled_at`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Domain`] when the payload is not a JSON object,
    /// or [`QueueError::Store`] when persistence fails.
    pub async fn enqueue(
        &self,
        kind: TaskKind,
        payload: Value,
        scheduled_at: DateTime<Utc>,
    ) -> QueueResult<QueueTask> {
        let task = QueueTask::new(kind, payload, scheduled_at, &*self.clock)?;
        self.store.insert(&task).await?;
        tracing::debug!(
            task_id = %task.id(),
            kind = %kind,
            scheduled_at = %scheduled_at,
            "task enqueued"
        );
        Ok(task)
    }

    /// Claims the next available task, if any.
    ///
    /// Tasks are taken in `(scheduled_at, id)` order. Returning `None` is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Store`] when persistence fails.
    pub async fn dequeue_next_available_task(&self) -> QueueResult<Option<(QueueTask, Lease)>> {
        let now = self.clock.utc();
        let claimed = self
            .store
            .claim_next_available(now, self.lease_duration)
            .await?;
        if let Some((task, lease)) = &claimed {
            tracing::debug!(
                task_id = %task.id(),
                kind = %task.kind(),
                lease_id = %lease.id,
                expires_at = %lease.expires_at,
                "task claimed"
            );
        }
        Ok(claimed)
    }

    /// Records that a task is finished. Repeated calls are no-ops.
    ///
    /// Returns `true` when this call recorded the completion.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Store`] when the task is unknown or persistence
    /// fails.
    pub async fn complete_task(&self, id: QueueTaskId) -> QueueResult<bool> {
        let inserted = self.store.insert_completion(id, self.clock.utc()).await?;
        if inserted {
            tracing::debug!(task_id = %id, "task completed");
        } else {
            tracing::debug!(task_id = %id, "task already completed");
        }
        Ok(inserted)
    }

    /// Appends an observability error for a task.
    ///
    /// This neither completes nor re-queues the task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Domain`] for an empty message, or
    /// [`QueueError::Store`] when persistence fails.
    pub async fn fail_task(
        &self,
        id: Option<QueueTaskId>,
        message: impl Into<String>,
    ) -> QueueResult<QueueErrorRecord> {
        let text = message.into();
        if text.trim().is_empty() {
            return Err(QueueDomainError::EmptyFailureMessage.into());
        }
        let record = QueueErrorRecord::new(id, text, self.clock.utc());
        self.store.insert_error(&record).await?;
        tracing::warn!(
            task_id = ?id,
            error_id = ?record.id,
            message = %record.message,
            "task failure recorded"
        );
        Ok(record)
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Store`] when persistence fails.
    pub async fn find_task(&self, id: QueueTaskId) -> QueueResult<Option<QueueTask>> {
        Ok(self.store.find_by_id(id).await?)
    }
}
