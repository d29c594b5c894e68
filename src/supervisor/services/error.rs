//! Errors raised by supervisor operations.

use crate::dispatch::domain::HandlerError;
use crate::queue::{ports::QueueStoreError, services::QueueError};
use crate::supervisor::{
    domain::{AttemptId, SupervisorDomainError, WorkflowKind, WorkflowTaskId},
    ports::WorkflowRepositoryError,
};
use std::sync::Arc;
use thiserror::Error;

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Service-level errors for supervisor operations.
#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    /// Domain validation failed, including the run-count tripwire.
    #[error(transparent)]
    Domain(#[from] SupervisorDomainError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] WorkflowRepositoryError),

    /// Scheduling follow-up work failed.
    #[error("queue operation failed: {0}")]
    Queue(Arc<QueueError>),

    /// A supervisor was invoked for a task of another workflow.
    #[error("workflow task {workflow_task_id} is {actual}, supervisor handles {expected}")]
    KindMismatch {
        /// Task that was loaded.
        workflow_task_id: WorkflowTaskId,
        /// Kind the supervisor handles.
        expected: WorkflowKind,
        /// Kind stored on the task.
        actual: WorkflowKind,
    },

    /// The supervisor tried to write a fact opposite to one already stored.
    #[error("attempt {attempt_id} already carries a {existing} fact")]
    ContradictedFact {
        /// Attempt whose fact was contradicted.
        attempt_id: AttemptId,
        /// Label of the stored fact.
        existing: &'static str,
    },

    /// The kickoff input stored on a task does not fit its workflow.
    #[error("workflow task {workflow_task_id} has invalid input: {reason}")]
    InvalidInput {
        /// Task whose input was rejected.
        workflow_task_id: WorkflowTaskId,
        /// Why the input was rejected.
        reason: String,
    },

    /// A workflow-specific collaborator failed.
    #[error("workflow collaborator failed: {0}")]
    Workflow(Arc<dyn std::error::Error + Send + Sync>),
}

impl SupervisorError {
    /// Wraps a workflow collaborator error.
    pub fn workflow(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Workflow(Arc::new(err))
    }

    /// Returns whether the failure may clear on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Repository(WorkflowRepositoryError::Persistence(_)) | Self::Workflow(_) => true,
            Self::Queue(err) => matches!(**err, QueueError::Store(QueueStoreError::Persistence(_))),
            _ => false,
        }
    }
}

impl From<QueueError> for SupervisorError {
    fn from(err: QueueError) -> Self {
        Self::Queue(Arc::new(err))
    }
}

impl From<SupervisorError> for HandlerError {
    fn from(err: SupervisorError) -> Self {
        if err.is_transient() {
            Self::infrastructure(err)
        } else {
            Self::Fatal(err.to_string())
        }
    }
}
