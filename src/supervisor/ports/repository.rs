//! Repository port for workflow tasks, attempts, and outcome facts.

use crate::supervisor::domain::{
    Attempt, AttemptId, AttemptOutcome, AttemptRecord, FactInsert, WorkflowKey, WorkflowKind,
    WorkflowTask, WorkflowTaskId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for workflow repository operations.
pub type WorkflowRepositoryResult<T> = Result<T, WorkflowRepositoryError>;

/// Exclusive hold on one workflow task, released on drop.
pub struct WorkflowLock {
    _guard: Box<dyn Send>,
}

impl WorkflowLock {
    /// Wraps an adapter-specific guard.
    #[must_use]
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for WorkflowLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowLock").finish_non_exhaustive()
    }
}

/// Result of an idempotent task creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The task was stored.
    Created(WorkflowTaskId),
    /// A task for the same kind and key is still in progress.
    InProgress(WorkflowTaskId),
}

/// Workflow persistence contract.
///
/// Tasks and attempts are append-only. Outcome facts are keyed by attempt
/// and at most one exists per attempt, whichever kind was written first.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Stores `task` unless another task of the same kind and key is in
    /// progress, meaning it has no success fact and fewer than
    /// `max_attempts` failure facts. The check and insert are atomic.
    async fn create_if_idle(
        &self,
        task: &WorkflowTask,
        max_attempts: u32,
    ) -> WorkflowRepositoryResult<CreateOutcome>;

    /// Finds a workflow task by identifier.
    async fn find_task(&self, id: WorkflowTaskId) -> WorkflowRepositoryResult<Option<WorkflowTask>>;

    /// Returns every task for the kind and key, oldest first.
    async fn tasks_for_key(
        &self,
        kind: WorkflowKind,
        key: &WorkflowKey,
    ) -> WorkflowRepositoryResult<Vec<WorkflowTask>>;

    /// Appends an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowRepositoryError::TaskNotFound`] when the owning
    /// task does not exist.
    async fn append_attempt(&self, attempt: &Attempt) -> WorkflowRepositoryResult<()>;

    /// Returns the attempt log with outcome facts, ordered by attempt number.
    async fn attempt_history(
        &self,
        task_id: WorkflowTaskId,
    ) -> WorkflowRepositoryResult<Vec<AttemptRecord>>;

    /// Finds an attempt by identifier.
    async fn find_attempt(&self, id: AttemptId) -> WorkflowRepositoryResult<Option<Attempt>>;

    /// Records an outcome fact with insert-or-ignore semantics.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowRepositoryError::AttemptNotFound`] when the attempt
    /// does not exist.
    async fn record_outcome(
        &self,
        outcome: &AttemptOutcome,
    ) -> WorkflowRepositoryResult<FactInsert>;

    /// Takes the exclusive lock on a workflow task, waiting if necessary.
    async fn lock(&self, id: WorkflowTaskId) -> WorkflowRepositoryResult<WorkflowLock>;
}

/// Errors returned by workflow repository implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkflowRepositoryError {
    /// A workflow task with the same identifier already exists.
    #[error("duplicate workflow task identifier: {0}")]
    DuplicateTask(WorkflowTaskId),

    /// The workflow task was not found.
    #[error("workflow task not found: {0}")]
    TaskNotFound(WorkflowTaskId),

    /// The attempt was not found.
    #[error("attempt not found: {0}")]
    AttemptNotFound(AttemptId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkflowRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
