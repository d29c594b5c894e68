//! Per-workflow behaviour plugged into the generic supervisor.

use super::SupervisorResult;
use crate::dispatch::domain::HandlerId;
use crate::supervisor::domain::{
    Attempt, Backoff, FactSnapshot, RetryPolicy, SupervisorState, WorkflowKind, WorkflowTask,
};
use async_trait::async_trait;
use serde_json::Value;

/// How a freshly started attempt proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStart {
    /// Work was handed to a worker; its handlers will record the outcome.
    Dispatched,
    /// The supervisor drives the attempt itself through
    /// [`Workflow::poll_attempt`].
    Inline,
}

/// Progress of an outstanding attempt as seen by the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptPoll {
    /// Nothing conclusive yet.
    Pending,
    /// The attempt succeeded with the given detail.
    Succeeded(Value),
    /// The attempt failed for the given reason.
    Failed(String),
}

/// Domain-specific half of a supervisor.
///
/// The generic engine owns locking, the run-count tripwire, fact
/// derivation and rescheduling. A workflow only answers questions about
/// its own domain.
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Workflow kind handled.
    fn kind(&self) -> WorkflowKind;

    /// Retry budget and exhaustion handling.
    fn policy(&self) -> RetryPolicy;

    /// Function that re-invokes this workflow's supervisor.
    fn supervisor_handler(&self) -> HandlerId;

    /// Returns whether the work is already done by other means.
    async fn is_satisfied(&self, task: &WorkflowTask) -> SupervisorResult<bool>;

    /// Starts the side effect for a newly appended attempt.
    async fn start_attempt(
        &self,
        task: &WorkflowTask,
        attempt: &Attempt,
    ) -> SupervisorResult<AttemptStart>;

    /// Checks on an outstanding attempt.
    ///
    /// Dispatched attempts are resolved by their handlers, so the default
    /// reports nothing new.
    async fn poll_attempt(
        &self,
        _task: &WorkflowTask,
        _attempt: &Attempt,
        _state: &SupervisorState,
    ) -> SupervisorResult<AttemptPoll> {
        Ok(AttemptPoll::Pending)
    }

    /// Seconds until the next recheck.
    fn recheck_delay(&self, facts: &FactSnapshot, _state: &SupervisorState) -> u64 {
        Backoff::new(self.policy().base_delay_secs).delay_secs(facts.failure_count)
    }
}
