//! Scrubs an account's personal data inside the database.

use super::support::{attempt_for, fact_document, input_of, not_served, supervise};
use crate::dispatch::{
    domain::{HandlerArgs, HandlerId, HandlerResult, decode_args},
    ports::FunctionHandler,
};
use crate::supervisor::{
    domain::{Attempt, KeyStatus, RetryPolicy, WorkflowKey, WorkflowKind, WorkflowTask},
    services::{
        AttemptStart, KickoffOutcome, SharedSupervisorService, SupervisorError, SupervisorResult,
        Workflow,
    },
};
use crate::workflows::{
    domain::AccountId,
    ports::{AccountDirectory, CollaboratorError, CollaboratorResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Input stored on each anonymization task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymizationInput {
    /// Account to scrub.
    pub account_id: AccountId,
}

/// Supervised anonymization of one account.
#[derive(Clone)]
pub struct AnonymizationWorkflow {
    supervisor: SharedSupervisorService,
    directory: Arc<dyn AccountDirectory>,
    policy: RetryPolicy,
}

impl AnonymizationWorkflow {
    /// Functions this workflow serves.
    pub const HANDLERS: [HandlerId; 2] = [
        HandlerId::SuperviseAccountAnonymization,
        HandlerId::AnonymizeAccount,
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

    /// Starts anonymizing `account_id` unless a run is already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence or scheduling fails.
    /// Unknown accounts are rejected as a value.
    pub async fn kickoff_account_anonymization(
        &self,
        account_id: AccountId,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        if !self.directory.account_exists(account_id).await? {
            return Ok(KickoffOutcome::rejected(
                "unknown_account",
                format!("account {account_id} does not exist"),
            ));
        }
        let document = serde_json::to_value(AnonymizationInput { account_id })
            .map_err(SupervisorError::workflow)?;
        self.supervisor
            .kickoff(self, &account_key(account_id).to_string(), document, scheduled_at)
            .await
    }

    /// Returns the status of the latest anonymization of `account_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence fails.
    pub async fn anonymization_status(&self, account_id: AccountId) -> SupervisorResult<KeyStatus> {
        self.supervisor
            .key_status(
                WorkflowKind::AccountAnonymization,
                &account_key(account_id),
                &self.policy,
            )
            .await
    }

    /// Returns whether the latest anonymization of `account_id` gave up.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence fails.
    pub async fn is_anonymization_stuck(&self, account_id: AccountId) -> SupervisorResult<bool> {
        Ok(self.anonymization_status(account_id).await?.is_stuck())
    }

    /// Returns whether the account's personal data is gone.
    ///
    /// An account that no longer exists holds nothing to scrub.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Persistence`] when the directory fails.
    pub async fn is_anonymized(&self, account_id: AccountId) -> CollaboratorResult<bool> {
        match self.directory.is_anonymized(account_id).await {
            Ok(anonymized) => Ok(anonymized),
            Err(CollaboratorError::UnknownAccount(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }

    async fn anonymize(&self, args: HandlerArgs) -> HandlerResult<Value> {
        let context =
            attempt_for(&self.supervisor, &args, WorkflowKind::AccountAnonymization).await?;
        let input: AnonymizationInput = input_of(&context.task)?;
        let inserted = match self
            .directory
            .anonymize(input.account_id, self.supervisor.now())
            .await
        {
            Ok(changed) => {
                self.supervisor
                    .record_success(args.attempt_id, json!({ "anonymized": changed }))
                    .await?
            }
            Err(err) => {
                tracing::warn!(
                    account_id = %input.account_id,
                    attempt_id = %args.attempt_id,
                    error = %err,
                    "anonymization failed"
                );
                self.supervisor
                    .record_failure(args.attempt_id, err.to_string())
                    .await?
            }
        };
        Ok(fact_document(&inserted))
    }
}

fn account_key(account_id: AccountId) -> WorkflowKey {
    WorkflowKey::from_uuid(account_id.into_inner())
}

#[async_trait]
impl Workflow for AnonymizationWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::AccountAnonymization
    }

    fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn supervisor_handler(&self) -> HandlerId {
        HandlerId::SuperviseAccountAnonymization
    }

    async fn is_satisfied(&self, task: &WorkflowTask) -> SupervisorResult<bool> {
        let input: AnonymizationInput = input_of(task)?;
        Ok(self.is_anonymized(input.account_id).await?)
    }

    async fn start_attempt(
        &self,
        _task: &WorkflowTask,
        attempt: &Attempt,
    ) -> SupervisorResult<AttemptStart> {
        self.supervisor
            .dispatch_function(HandlerId::AnonymizeAccount, &HandlerArgs::for_attempt(attempt))
            .await?;
        Ok(AttemptStart::Dispatched)
    }
}

#[async_trait]
impl FunctionHandler for AnonymizationWorkflow {
    async fn call(&self, function: HandlerId, args: Value) -> HandlerResult<Value> {
        match function {
            HandlerId::SuperviseAccountAnonymization => {
                supervise(&self.supervisor, self, args).await
            }
            HandlerId::AnonymizeAccount => self.anonymize(decode_args(args)?).await,
            other => Err(not_served(other, WorkflowKind::AccountAnonymization)),
        }
    }
}
