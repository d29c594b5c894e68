//! Payload shapes written into queue tasks.

use super::{HandlerError, HandlerId};
use crate::supervisor::domain::{Attempt, AttemptId, WorkflowTaskId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Payload of a `db_function` task: one registered function and its
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function to invoke.
    pub function: HandlerId,
    /// Arguments passed to the function.
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    /// Builds a call whose arguments are the serialized `args`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPayload`] when `args` cannot be
    /// serialized.
    pub fn new(
        function: HandlerId,
        args: &(impl Serialize + ?Sized),
    ) -> Result<Self, HandlerError> {
        let value = serde_json::to_value(args).map_err(HandlerError::invalid_payload)?;
        Ok(Self {
            function,
            args: value,
        })
    }

    /// Deserializes the arguments into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPayload`] when the arguments do not
    /// match `T`.
    pub fn args_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        decode_args(self.args.clone())
    }
}

/// Payload of a provider task. The worker calls `before_handler` to obtain
/// provider input, performs the side effect, then reports the outcome to
/// `success_handler` or `error_handler`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectEnvelope {
    /// Workflow task the side effect belongs to.
    pub workflow_task_id: WorkflowTaskId,
    /// Attempt the outcome is recorded against.
    pub attempt_id: AttemptId,
    /// Builds provider input.
    pub before_handler: HandlerId,
    /// Records a provider success.
    pub success_handler: HandlerId,
    /// Records a provider failure.
    pub error_handler: HandlerId,
}

impl SideEffectEnvelope {
    /// Arguments for the before handler.
    #[must_use]
    pub fn before_args(&self) -> HandlerArgs {
        HandlerArgs {
            workflow_task_id: self.workflow_task_id,
            attempt_id: self.attempt_id,
            response: Value::Null,
            error: None,
        }
    }

    /// Arguments for the success handler, carrying the provider response.
    #[must_use]
    pub fn success_args(&self, response: Value) -> HandlerArgs {
        HandlerArgs {
            response,
            ..self.before_args()
        }
    }

    /// Arguments for the error handler, carrying the provider error.
    #[must_use]
    pub fn error_args(&self, error: impl Into<String>) -> HandlerArgs {
        HandlerArgs {
            error: Some(error.into()),
            ..self.before_args()
        }
    }
}

/// Arguments every envelope handler receives.
///
/// Database functions that act on an attempt take the same shape without a
/// response or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerArgs {
    /// Workflow task the side effect belongs to.
    pub workflow_task_id: WorkflowTaskId,
    /// Attempt the outcome is recorded against.
    pub attempt_id: AttemptId,
    /// Provider response, for success handlers.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub response: Value,
    /// Provider error, for error handlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandlerArgs {
    /// Arguments naming `attempt` and nothing else.
    #[must_use]
    pub fn for_attempt(attempt: &Attempt) -> Self {
        Self {
            workflow_task_id: attempt.workflow_task_id,
            attempt_id: attempt.id,
            response: Value::Null,
            error: None,
        }
    }
}

/// Deserializes handler arguments, reporting mismatches as invalid payloads.
///
/// # Errors
///
/// Returns [`HandlerError::InvalidPayload`] when `args` does not match `T`.
pub fn decode_args<T: DeserializeOwned>(args: Value) -> Result<T, HandlerError> {
    serde_json::from_value(args).map_err(HandlerError::invalid_payload)
}
