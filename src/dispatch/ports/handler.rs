//! Contract implemented by every registered function.

use crate::dispatch::domain::{HandlerId, HandlerResult};
use async_trait::async_trait;
use serde_json::Value;

/// A typed implementation behind one or more [`HandlerId`]s.
///
/// Implementations receive the identifier they were invoked as so one
/// workflow can serve its supervisor and its side-effect handlers.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    /// Runs `function` with `args` and returns its result document.
    async fn call(&self, function: HandlerId, args: Value) -> HandlerResult<Value>;
}
