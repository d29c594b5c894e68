//! Current state derived from the attempt log.

use super::{Attempt, AttemptId, AttemptRecord, RetryPolicy, WorkflowTaskId};
use serde::{Deserialize, Serialize};

/// Facts a supervisor reasons over, derived from a task's attempt log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSnapshot {
    /// Number of attempts started.
    pub attempt_count: u32,
    /// Number of attempts with a failure fact.
    pub failure_count: u32,
    /// The attempt carrying a success fact, if any.
    pub succeeded_attempt: Option<AttemptId>,
    /// The most recent attempt with no outcome fact yet.
    pub open_attempt: Option<Attempt>,
}

impl FactSnapshot {
    /// Derives the snapshot from an attempt log in any order.
    #[must_use]
    pub fn derive(history: &[AttemptRecord]) -> Self {
        let mut snapshot = Self::default();
        for record in history {
            snapshot.attempt_count = snapshot.attempt_count.saturating_add(1);
            match &record.outcome {
                Some(outcome) if outcome.is_success() => {
                    snapshot.succeeded_attempt.get_or_insert(outcome.attempt_id());
                }
                Some(_) => snapshot.failure_count = snapshot.failure_count.saturating_add(1),
                None => {
                    let is_later = snapshot
                        .open_attempt
                        .as_ref()
                        .is_none_or(|open| open.number < record.attempt.number);
                    if is_later {
                        snapshot.open_attempt = Some(record.attempt.clone());
                    }
                }
            }
        }
        snapshot
    }

    /// Returns whether any attempt succeeded.
    #[must_use]
    pub const fn has_succeeded(&self) -> bool {
        self.succeeded_attempt.is_some()
    }

    /// Returns whether the retry budget is spent without a success.
    #[must_use]
    pub const fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        !self.has_succeeded() && self.failure_count >= policy.max_attempts
    }

    /// Returns whether the task still counts as in progress for its key.
    #[must_use]
    pub const fn is_in_progress(&self, policy: &RetryPolicy) -> bool {
        !self.has_succeeded() && self.failure_count < policy.max_attempts
    }
}

/// Status of the most recent workflow task for a domain key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "workflow_task_id", rename_all = "snake_case")]
pub enum KeyStatus {
    /// No workflow task exists for the key.
    Idle,
    /// A task exists that has neither succeeded nor exhausted its budget.
    InProgress(WorkflowTaskId),
    /// The latest task succeeded.
    Succeeded(WorkflowTaskId),
    /// The latest task used up its attempts without success.
    Exhausted(WorkflowTaskId),
}

impl KeyStatus {
    /// Classifies a task from its facts.
    #[must_use]
    pub const fn classify(id: WorkflowTaskId, facts: &FactSnapshot, policy: &RetryPolicy) -> Self {
        if facts.has_succeeded() {
            Self::Succeeded(id)
        } else if facts.is_exhausted(policy) {
            Self::Exhausted(id)
        } else {
            Self::InProgress(id)
        }
    }

    /// Returns whether the key is stuck: its latest task gave up.
    #[must_use]
    pub const fn is_stuck(self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}
