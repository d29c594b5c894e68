//! `PostgreSQL` adapter for workflow persistence.

mod lock;
mod models;
mod repository;
mod schema;

pub use repository::{PostgresWorkflowRepository, WorkflowPgPool};
