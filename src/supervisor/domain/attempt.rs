//! Attempts and the immutable outcome facts recorded against them.

use super::{AttemptId, WorkflowTaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One scheduling cycle of work toward a workflow task. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// Attempt identifier.
    pub id: AttemptId,
    /// Owning workflow task.
    pub workflow_task_id: WorkflowTaskId,
    /// One-based position in the task's attempt log.
    pub number: u32,
    /// When the attempt was started.
    pub started_at: DateTime<Utc>,
}

impl Attempt {
    /// Creates the attempt following `previous_attempts` earlier ones.
    #[must_use]
    pub fn next(
        workflow_task_id: WorkflowTaskId,
        previous_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AttemptId::new(),
            workflow_task_id,
            number: previous_attempts.saturating_add(1),
            started_at: now,
        }
    }
}

/// Terminal fact for an attempt. At most one exists per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The attempt's side effect happened.
    Succeeded {
        /// Attempt the fact belongs to.
        attempt_id: AttemptId,
        /// Provider or handler detail kept for auditing.
        detail: Value,
        /// When the fact was recorded.
        recorded_at: DateTime<Utc>,
    },
    /// The attempt's side effect failed.
    Failed {
        /// Attempt the fact belongs to.
        attempt_id: AttemptId,
        /// Failure description.
        reason: String,
        /// When the fact was recorded.
        recorded_at: DateTime<Utc>,
    },
}

impl AttemptOutcome {
    /// Returns the attempt the fact belongs to.
    #[must_use]
    pub const fn attempt_id(&self) -> AttemptId {
        match self {
            Self::Succeeded { attempt_id, .. } | Self::Failed { attempt_id, .. } => *attempt_id,
        }
    }

    /// Returns whether this is a success fact.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Returns when the fact was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Succeeded { recorded_at, .. } | Self::Failed { recorded_at, .. } => *recorded_at,
        }
    }

    /// Returns the storage label for the outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// An attempt together with its outcome fact, if one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The attempt.
    pub attempt: Attempt,
    /// Its outcome fact, absent while the attempt is outstanding.
    pub outcome: Option<AttemptOutcome>,
}

/// Result of recording an outcome fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactInsert {
    /// The fact was written by this call.
    Recorded,
    /// An identical-kind fact already existed; nothing was written.
    AlreadyRecorded,
    /// The attempt already carries the opposite fact; nothing was written.
    Contradicted(AttemptOutcome),
}
