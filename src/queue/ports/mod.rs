//! Port contracts for the task store.

pub mod store;

pub use store::{QueueStoreError, QueueStoreResult, TaskStore};
