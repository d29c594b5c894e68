//! Maps every [`HandlerId`] to its implementation.

use crate::dispatch::{
    domain::{HandlerError, HandlerId, HandlerResult},
    ports::FunctionHandler,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Some identifiers have no implementation.
    #[error("functions without a registered handler: {0:?}")]
    Unregistered(Vec<HandlerId>),
    /// An identifier was registered twice.
    #[error("function registered twice: {0}")]
    DuplicateRegistration(HandlerId),
}

/// Collects handler registrations before validation.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<HandlerId, Arc<dyn FunctionHandler>>,
    duplicate: Option<HandlerId>,
}

impl HandlerRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for each of `functions`.
    #[must_use]
    pub fn register(
        mut self,
        handler: Arc<dyn FunctionHandler>,
        functions: impl IntoIterator<Item = HandlerId>,
    ) -> Self {
        for function in functions {
            if self
                .handlers
                .insert(function, Arc::clone(&handler))
                .is_some()
            {
                self.duplicate.get_or_insert(function);
            }
        }
        self
    }

    /// Validates that every identifier is covered exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when an identifier is missing or was
    /// registered more than once.
    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        if let Some(function) = self.duplicate {
            return Err(RegistryError::DuplicateRegistration(function));
        }
        let missing: Vec<HandlerId> = HandlerId::ALL
            .into_iter()
            .filter(|id| !self.handlers.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(RegistryError::Unregistered(missing));
        }
        Ok(HandlerRegistry {
            handlers: self.handlers,
        })
    }
}

/// Complete mapping from function identifiers to implementations.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerId, Arc<dyn FunctionHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("functions", &self.handlers.len())
            .finish()
    }
}

impl HandlerRegistry {
    /// Invokes a registered function.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`HandlerError`].
    pub async fn run_function(&self, function: HandlerId, args: Value) -> HandlerResult<Value> {
        let handler = self.handlers.get(&function).ok_or_else(|| {
            HandlerError::Fatal(format!("no handler registered for {function}"))
        })?;
        tracing::debug!(function = %function, "running function");
        handler.call(function, args).await
    }

    /// Invokes a function by its canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::UnknownFunction`] for names outside the closed
    /// set, otherwise propagates the handler's error.
    pub async fn run_function_by_name(&self, name: &str, args: Value) -> HandlerResult<Value> {
        let function = HandlerId::try_from(name)?;
        self.run_function(function, args).await
    }
}
