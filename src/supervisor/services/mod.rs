//! Supervisor engine shared by every workflow.

mod engine;
mod error;
mod workflow;

pub use engine::{
    AttemptContext, DEFAULT_MAX_SUPERVISOR_RUNS, KickoffOutcome, SharedSupervisorService,
    SupervisorOutcome, SupervisorService, ValidationFailure,
};
pub use error::{SupervisorError, SupervisorResult};
pub use workflow::{AttemptPoll, AttemptStart, Workflow};
