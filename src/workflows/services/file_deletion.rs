//! Deletes one stored file through the storage provider.

use super::support::{attempt_for, fact_document, input_of, not_served, provider_error, supervise};
use crate::dispatch::{
    domain::{HandlerArgs, HandlerId, HandlerResult, decode_args},
    ports::FunctionHandler,
};
use crate::queue::domain::TaskKind;
use crate::supervisor::{
    domain::{Attempt, KeyStatus, RetryPolicy, WorkflowKey, WorkflowKind, WorkflowTask},
    services::{
        AttemptStart, KickoffOutcome, SharedSupervisorService, SupervisorError, SupervisorResult,
        Workflow,
    },
};
use crate::workflows::{
    domain::{AccountId, FileId},
    ports::{AccountDirectory, CollaboratorError},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Input stored on each file deletion task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeletionInput {
    /// File to delete.
    pub file_id: FileId,
    /// Owning account.
    pub account_id: AccountId,
    /// Storage location handed to the provider.
    pub location: String,
}

/// Supervised deletion of a single file.
#[derive(Clone)]
pub struct FileDeletionWorkflow {
    supervisor: SharedSupervisorService,
    directory: Arc<dyn AccountDirectory>,
    policy: RetryPolicy,
}

impl FileDeletionWorkflow {
    /// Functions this workflow serves.
    pub const HANDLERS: [HandlerId; 4] = [
        HandlerId::SuperviseFileDeletion,
        HandlerId::FileDeleteBefore,
        HandlerId::FileDeleteSuccess,
        HandlerId::FileDeleteError,
    ];

    /// Creates the workflow.
    #[must_use]
    pub const fn new(
        supervisor: SharedSupervisorService,
        directory: Arc<dyn AccountDirectory>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            supervisor,
            directory,
            policy,
        }
    }

    /// Starts deleting `file_id` unless a deletion is already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence or scheduling fails.
    /// Unknown files are rejected as a value.
    pub async fn kickoff_file_deletion(
        &self,
        file_id: FileId,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        let Some(file) = self.directory.find_file(file_id).await? else {
            return Ok(KickoffOutcome::rejected(
                "unknown_file",
                format!("file {file_id} does not exist"),
            ));
        };
        let input = FileDeletionInput {
            file_id,
            account_id: file.account_id,
            location: file.location,
        };
        let document = serde_json::to_value(&input)
            .map_err(SupervisorError::workflow)?;
        self.supervisor
            .kickoff(self, &file_key(file_id).to_string(), document, scheduled_at)
            .await
    }

    /// Returns the status of the latest deletion task for `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence fails.
    pub async fn file_deletion_status(&self, file_id: FileId) -> SupervisorResult<KeyStatus> {
        self.supervisor
            .key_status(WorkflowKind::FileDeletion, &file_key(file_id), &self.policy)
            .await
    }

    /// Returns whether the latest deletion of `file_id` gave up.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence fails.
    pub async fn is_file_deletion_stuck(&self, file_id: FileId) -> SupervisorResult<bool> {
        Ok(self.file_deletion_status(file_id).await?.is_stuck())
    }

    async fn before(&self, args: HandlerArgs) -> HandlerResult<Value> {
        let context = attempt_for(&self.supervisor, &args, WorkflowKind::FileDeletion).await?;
        let input: FileDeletionInput = input_of(&context.task)?;
        Ok(json!({ "file_id": input.file_id, "location": input.location }))
    }

    async fn succeeded(&self, args: HandlerArgs) -> HandlerResult<Value> {
        let context = attempt_for(&self.supervisor, &args, WorkflowKind::FileDeletion).await?;
        let input: FileDeletionInput = input_of(&context.task)?;
        match self
            .directory
            .mark_file_deleted(input.file_id, self.supervisor.now())
            .await
        {
            Ok(_) | Err(CollaboratorError::UnknownFile(_)) => {}
            Err(err) => return Err(err.into()),
        }
        let inserted = self
            .supervisor
            .record_success(args.attempt_id, json!({ "response": args.response }))
            .await?;
        Ok(fact_document(&inserted))
    }

    async fn failed(&self, args: HandlerArgs) -> HandlerResult<Value> {
        attempt_for(&self.supervisor, &args, WorkflowKind::FileDeletion).await?;
        let inserted = self
            .supervisor
            .record_failure(args.attempt_id, provider_error(&args))
            .await?;
        Ok(fact_document(&inserted))
    }
}

fn file_key(file_id: FileId) -> WorkflowKey {
    WorkflowKey::from_uuid(file_id.into_inner())
}

#[async_trait]
impl Workflow for FileDeletionWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::FileDeletion
    }

    fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn supervisor_handler(&self) -> HandlerId {
        HandlerId::SuperviseFileDeletion
    }

    async fn is_satisfied(&self, task: &WorkflowTask) -> SupervisorResult<bool> {
        let input: FileDeletionInput = input_of(task)?;
        let file = self.directory.find_file(input.file_id).await?;
        Ok(file.is_none_or(|stored| stored.is_deleted()))
    }

    async fn start_attempt(
        &self,
        _task: &WorkflowTask,
        attempt: &Attempt,
    ) -> SupervisorResult<AttemptStart> {
        self.supervisor
            .dispatch_side_effect(
                TaskKind::FileDelete,
                attempt,
                [
                    HandlerId::FileDeleteBefore,
                    HandlerId::FileDeleteSuccess,
                    HandlerId::FileDeleteError,
                ],
            )
            .await?;
        Ok(AttemptStart::Dispatched)
    }
}

#[async_trait]
impl FunctionHandler for FileDeletionWorkflow {
    async fn call(&self, function: HandlerId, args: Value) -> HandlerResult<Value> {
        match function {
            HandlerId::SuperviseFileDeletion => supervise(&self.supervisor, self, args).await,
            HandlerId::FileDeleteBefore => self.before(decode_args(args)?).await,
            HandlerId::FileDeleteSuccess => self.succeeded(decode_args(args)?).await,
            HandlerId::FileDeleteError => self.failed(decode_args(args)?).await,
            other => Err(not_served(other, WorkflowKind::FileDeletion)),
        }
    }
}
