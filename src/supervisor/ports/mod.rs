//! Port contracts for supervised workflow persistence.

pub mod repository;

pub use repository::{
    CreateOutcome, WorkflowLock, WorkflowRepository, WorkflowRepositoryError,
    WorkflowRepositoryResult,
};
