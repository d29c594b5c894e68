//! Retry policies applied by supervisors.

use serde::{Deserialize, Serialize};

/// What a supervisor reports once a task has used up its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Report a permanent failure that operators and dependents can see.
    Surface,
    /// Finish quietly so nothing waiting on the task is blocked.
    Absorb,
}

/// Attempt budget and backoff base for one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Failures after which no further attempt is started.
    pub max_attempts: u32,
    /// Base of the exponential recheck delay, in seconds.
    pub base_delay_secs: u64,
    /// Behaviour once `max_attempts` failures have been recorded.
    pub on_exhausted: ExhaustionPolicy,
}

impl RetryPolicy {
    /// Creates a policy that surfaces exhaustion.
    #[must_use]
    pub const fn surfacing(max_attempts: u32, base_delay_secs: u64) -> Self {
        Self {
            max_attempts,
            base_delay_secs,
            on_exhausted: ExhaustionPolicy::Surface,
        }
    }

    /// Creates a policy that absorbs exhaustion.
    #[must_use]
    pub const fn absorbing(max_attempts: u32, base_delay_secs: u64) -> Self {
        Self {
            max_attempts,
            base_delay_secs,
            on_exhausted: ExhaustionPolicy::Absorb,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::surfacing(3, 5)
    }
}
