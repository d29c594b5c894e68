//! Workflow repository adapters.

pub mod memory;
pub mod postgres;
