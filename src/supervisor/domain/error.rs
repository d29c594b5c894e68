//! Error types for supervisor domain validation.

use super::WorkflowTaskId;
use thiserror::Error;

/// Errors returned while constructing or advancing supervisor values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupervisorDomainError {
    /// Workflow keys must not be blank.
    #[error("workflow key must not be empty")]
    EmptyKey,

    /// Workflow keys are stored in a bounded column.
    #[error("workflow key exceeds {max} characters")]
    KeyTooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// A supervisor rescheduled itself more often than any workflow needs.
    ///
    /// This signals a scheduling bug, not a business failure.
    #[error(
        "supervisor for workflow task {workflow_task_id} exceeded {limit} runs (run {run_count})"
    )]
    RunawaySupervisor {
        /// Workflow task whose supervisor tripped.
        workflow_task_id: WorkflowTaskId,
        /// Run count that would have been reached.
        run_count: u32,
        /// Configured cap.
        limit: u32,
    },
}

/// Error returned while parsing workflow kinds from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown workflow kind: {0}")]
pub struct ParseWorkflowKindError(pub String);
