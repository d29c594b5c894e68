//! Plumbing shared by the concrete workflows.

use crate::dispatch::domain::{HandlerArgs, HandlerError, HandlerId, HandlerResult, decode_args};
use crate::supervisor::{
    domain::{FactInsert, SupervisorState, WorkflowKind, WorkflowTask},
    services::{AttemptContext, SharedSupervisorService, SupervisorError, SupervisorResult, Workflow},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Runs one supervisor invocation from a queued `db_function` payload.
pub(super) async fn supervise(
    supervisor: &SharedSupervisorService,
    workflow: &dyn Workflow,
    args: Value,
) -> HandlerResult<Value> {
    let state: SupervisorState = decode_args(args)?;
    let outcome = supervisor.invoke(workflow, state).await?;
    serde_json::to_value(outcome).map_err(|err| HandlerError::Fatal(err.to_string()))
}

/// Loads the attempt named by handler arguments and checks it belongs to a
/// task of `kind`.
pub(super) async fn attempt_for(
    supervisor: &SharedSupervisorService,
    args: &HandlerArgs,
    kind: WorkflowKind,
) -> HandlerResult<AttemptContext> {
    let context = supervisor
        .attempt_context(args.attempt_id)
        .await?
        .ok_or_else(|| HandlerError::Fatal(format!("attempt {} not found", args.attempt_id)))?;
    if context.task.id() != args.workflow_task_id || context.task.kind() != kind {
        return Err(HandlerError::Fatal(format!(
            "attempt {} does not belong to {kind} task {}",
            args.attempt_id, args.workflow_task_id
        )));
    }
    Ok(context)
}

/// Decodes the kickoff input stored on a task.
pub(super) fn input_of<T: DeserializeOwned>(task: &WorkflowTask) -> SupervisorResult<T> {
    serde_json::from_value(task.input().clone()).map_err(|err| SupervisorError::InvalidInput {
        workflow_task_id: task.id(),
        reason: err.to_string(),
    })
}

/// Reports how a fact insert went, as handler output.
pub(super) fn fact_document(insert: &FactInsert) -> Value {
    let fact = match insert {
        FactInsert::Recorded => "recorded",
        FactInsert::AlreadyRecorded => "already_recorded",
        FactInsert::Contradicted(_) => "contradicted",
    };
    json!({ "fact": fact })
}

/// Error for a function routed to a handler that does not serve it.
pub(super) fn not_served(function: HandlerId, workflow: WorkflowKind) -> HandlerError {
    HandlerError::Fatal(format!("{function} is not served by the {workflow} workflow"))
}

/// Reason recorded when a provider reports failure without detail.
pub(super) fn provider_error(args: &HandlerArgs) -> String {
    args.error
        .clone()
        .unwrap_or_else(|| "provider reported an unspecified error".to_owned())
}
