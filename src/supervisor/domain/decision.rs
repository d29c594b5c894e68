//! Decision table shared by every supervisor.

use super::{Attempt, FactSnapshot, RetryPolicy};

/// What a supervisor invocation should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A success fact exists; nothing left to do.
    Succeeded,
    /// The work is already done by other means; record success and stop.
    RecordSuccess,
    /// The retry budget is spent.
    Exhausted,
    /// No attempt is outstanding; start one.
    StartAttempt,
    /// An attempt is outstanding; check on it without starting new work.
    AwaitAttempt(Attempt),
}

/// Decides the next action from derived facts.
///
/// `domain_done` is the workflow's own check for work completed outside
/// the attempt log (for example, a file that is already gone).
#[must_use]
pub fn decide(facts: &FactSnapshot, policy: &RetryPolicy, domain_done: bool) -> Decision {
    if facts.has_succeeded() {
        return Decision::Succeeded;
    }
    if domain_done {
        return Decision::RecordSuccess;
    }
    if facts.failure_count >= policy.max_attempts {
        return Decision::Exhausted;
    }
    match &facts.open_attempt {
        None => Decision::StartAttempt,
        Some(attempt) => Decision::AwaitAttempt(attempt.clone()),
    }
}
