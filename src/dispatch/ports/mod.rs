//! Port contracts for dispatchable functions.

mod handler;

pub use handler::FunctionHandler;
