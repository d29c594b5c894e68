//! Explicit state carried from one supervisor invocation to the next.

use super::{SupervisorDomainError, WorkflowTaskId};
use serde::{Deserialize, Serialize};

/// State serialized into every rescheduled supervisor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorState {
    /// Workflow task under supervision.
    pub workflow_task_id: WorkflowTaskId,
    /// Invocations completed so far.
    #[serde(default)]
    pub run_count: u32,
    /// Seconds spent waiting on the current attempt.
    #[serde(default)]
    pub waited_secs: u64,
}

impl SupervisorState {
    /// Creates the state for the first invocation.
    #[must_use]
    pub const fn initial(workflow_task_id: WorkflowTaskId) -> Self {
        Self {
            workflow_task_id,
            run_count: 0,
            waited_secs: 0,
        }
    }

    /// Counts this invocation, tripping once the cap is exceeded.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorDomainError::RunawaySupervisor`] when the
    /// incremented run count would exceed `limit`.
    pub const fn begin_run(self, limit: u32) -> Result<Self, SupervisorDomainError> {
        let run_count = self.run_count.saturating_add(1);
        if run_count > limit {
            return Err(SupervisorDomainError::RunawaySupervisor {
                workflow_task_id: self.workflow_task_id,
                run_count,
                limit,
            });
        }
        Ok(Self { run_count, ..self })
    }

    /// Returns the state for the next invocation after waiting `delay_secs`.
    #[must_use]
    pub const fn waiting(self, delay_secs: u64) -> Self {
        Self {
            waited_secs: self.waited_secs.saturating_add(delay_secs),
            ..self
        }
    }

    /// Returns the state for the next invocation after a new attempt started.
    #[must_use]
    pub const fn fresh_attempt(self) -> Self {
        Self {
            waited_secs: 0,
            ..self
        }
    }
}
