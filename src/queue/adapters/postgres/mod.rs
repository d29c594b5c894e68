//! `PostgreSQL` adapter for the task store.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTaskStore, QueuePgPool};
