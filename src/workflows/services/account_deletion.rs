//! Root workflow that deletes an account's files, then anonymizes it.
//!
//! The root task runs a single inline attempt that advances through ordered
//! phases on every invocation:
//!
//! 1. Files: every undeleted file gets its own file deletion workflow. If
//!    any of them gave up, the root attempt fails.
//! 2. Anonymization: entered only once no file remains. Kicks off the
//!    anonymization workflow and fails the root attempt if it gave up.
//! 3. Complete: the root success fact is recorded.
//!
//! With the default budget of one attempt, a stuck leaf surfaces as a
//! permanent root failure instead of looping.

use super::support::{input_of, not_served, supervise};
use super::{AnonymizationWorkflow, FileDeletionWorkflow};
use crate::dispatch::{
    domain::{HandlerId, HandlerResult},
    ports::FunctionHandler,
};
use crate::supervisor::{
    domain::{
        Attempt, KeyStatus, RetryPolicy, SupervisorState, WorkflowKey, WorkflowKind, WorkflowTask,
    },
    services::{
        AttemptPoll, AttemptStart, KickoffOutcome, SharedSupervisorService, SupervisorError,
        SupervisorResult, Workflow,
    },
};
use crate::workflows::{
    domain::{AccountId, FileId, StoredFile},
    ports::AccountDirectory,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Input stored on each account deletion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeletionInput {
    /// Account to delete.
    pub account_id: AccountId,
}

/// Phase an account deletion is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPhase {
    /// No account deletion was requested.
    NotStarted,
    /// Files are still being deleted.
    Files,
    /// Files are gone; personal data is being scrubbed.
    Anonymization,
    /// Every phase finished.
    Complete,
    /// The root task gave up.
    Failed,
}

/// Operator view of an account deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeletionStatus {
    /// Account being deleted.
    pub account_id: AccountId,
    /// Current phase.
    pub phase: DeletionPhase,
    /// Status of the latest root task.
    pub root: KeyStatus,
    /// Files not yet deleted.
    pub pending_files: Vec<FileId>,
    /// Files whose deletion gave up.
    pub stuck_files: Vec<FileId>,
    /// Whether personal data is gone.
    pub anonymized: bool,
    /// Whether anonymization gave up.
    pub anonymization_stuck: bool,
}

/// Composite workflow deleting an account.
#[derive(Clone)]
pub struct AccountDeletionWorkflow {
    supervisor: SharedSupervisorService,
    directory: Arc<dyn AccountDirectory>,
    file_deletion: Arc<FileDeletionWorkflow>,
    anonymization: Arc<AnonymizationWorkflow>,
    policy: RetryPolicy,
}

impl AccountDeletionWorkflow {
    /// Functions this workflow serves.
    pub const HANDLERS: [HandlerId; 1] = [HandlerId::SuperviseAccountDeletion];

    /// Creates the workflow over its two leaf workflows.
    #[must_use]
    pub const fn new(
        supervisor: SharedSupervisorService,
        directory: Arc<dyn AccountDirectory>,
        file_deletion: Arc<FileDeletionWorkflow>,
        anonymization: Arc<AnonymizationWorkflow>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            supervisor,
            directory,
            file_deletion,
            anonymization,
            policy,
        }
    }

    /// Starts deleting `account_id` unless a deletion is already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence or scheduling fails.
    /// Unknown accounts are rejected as a value.
    pub async fn kickoff_account_deletion(
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
        let document = serde_json::to_value(AccountDeletionInput { account_id })
            .map_err(SupervisorError::workflow)?;
        self.supervisor
            .kickoff(self, &account_key(account_id).to_string(), document, scheduled_at)
            .await
    }

    /// Returns whether every file the account owns is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when the directory fails.
    pub async fn all_files_deleted(&self, account_id: AccountId) -> SupervisorResult<bool> {
        Ok(self.pending_files(account_id).await?.is_empty())
    }

    /// Returns whether the latest account deletion gave up.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence fails.
    pub async fn is_account_deletion_stuck(&self, account_id: AccountId) -> SupervisorResult<bool> {
        Ok(self.root_status(account_id).await?.is_stuck())
    }

    /// Reports where an account deletion stands.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence or the directory fails.
    pub async fn deletion_status(
        &self,
        account_id: AccountId,
    ) -> SupervisorResult<AccountDeletionStatus> {
        let root = self.root_status(account_id).await?;
        let pending = self.pending_files(account_id).await?;
        let mut stuck_files = Vec::new();
        for file in &pending {
            if self.file_deletion.is_file_deletion_stuck(file.id).await? {
                stuck_files.push(file.id);
            }
        }
        let anonymized = self.anonymization.is_anonymized(account_id).await?;
        let anonymization_stuck = self.anonymization.is_anonymization_stuck(account_id).await?;
        let phase = match root {
            KeyStatus::Idle => DeletionPhase::NotStarted,
            KeyStatus::Exhausted(_) => DeletionPhase::Failed,
            KeyStatus::Succeeded(_) => DeletionPhase::Complete,
            KeyStatus::InProgress(_) if !pending.is_empty() => DeletionPhase::Files,
            KeyStatus::InProgress(_) => DeletionPhase::Anonymization,
        };
        Ok(AccountDeletionStatus {
            account_id,
            phase,
            root,
            pending_files: pending.iter().map(|file| file.id).collect(),
            stuck_files,
            anonymized,
            anonymization_stuck,
        })
    }

    async fn root_status(&self, account_id: AccountId) -> SupervisorResult<KeyStatus> {
        self.supervisor
            .key_status(
                WorkflowKind::AccountDeletion,
                &account_key(account_id),
                &self.policy,
            )
            .await
    }

    async fn pending_files(&self, account_id: AccountId) -> SupervisorResult<Vec<StoredFile>> {
        let files = self.directory.files_owned_by(account_id).await?;
        Ok(files.into_iter().filter(|file| !file.is_deleted()).collect())
    }

    async fn advance_files(
        &self,
        account_id: AccountId,
        pending: &[StoredFile],
    ) -> SupervisorResult<AttemptPoll> {
        for file in pending {
            if self.file_deletion.is_file_deletion_stuck(file.id).await? {
                tracing::warn!(
                    account_id = %account_id,
                    file_id = %file.id,
                    "file deletion stuck, account deletion cannot finish"
                );
                return Ok(AttemptPoll::Failed(format!(
                    "deletion of file {} gave up",
                    file.id
                )));
            }
        }
        let now = self.supervisor.now();
        for file in pending {
            let outcome = self.file_deletion.kickoff_file_deletion(file.id, now).await?;
            if let Some(failure) = outcome.validation_failure() {
                tracing::debug!(
                    file_id = %file.id,
                    code = %failure.code,
                    "file deletion kickoff rejected"
                );
            }
        }
        Ok(AttemptPoll::Pending)
    }

    async fn advance_anonymization(
        &self,
        account_id: AccountId,
        deleted_files: usize,
    ) -> SupervisorResult<AttemptPoll> {
        if self.anonymization.is_anonymized(account_id).await? {
            return Ok(AttemptPoll::Succeeded(json!({
                "files_deleted": deleted_files,
                "anonymized": true,
            })));
        }
        if self.anonymization.is_anonymization_stuck(account_id).await? {
            tracing::warn!(
                account_id = %account_id,
                "anonymization stuck, account deletion cannot finish"
            );
            return Ok(AttemptPoll::Failed("anonymization gave up".to_owned()));
        }
        self.anonymization
            .kickoff_account_anonymization(account_id, self.supervisor.now())
            .await?;
        Ok(AttemptPoll::Pending)
    }
}

fn account_key(account_id: AccountId) -> WorkflowKey {
    WorkflowKey::from_uuid(account_id.into_inner())
}

#[async_trait]
impl Workflow for AccountDeletionWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::AccountDeletion
    }

    fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn supervisor_handler(&self) -> HandlerId {
        HandlerId::SuperviseAccountDeletion
    }

    async fn is_satisfied(&self, task: &WorkflowTask) -> SupervisorResult<bool> {
        let input: AccountDeletionInput = input_of(task)?;
        Ok(self.all_files_deleted(input.account_id).await?
            && self.anonymization.is_anonymized(input.account_id).await?)
    }

    async fn start_attempt(
        &self,
        _task: &WorkflowTask,
        _attempt: &Attempt,
    ) -> SupervisorResult<AttemptStart> {
        Ok(AttemptStart::Inline)
    }

    async fn poll_attempt(
        &self,
        task: &WorkflowTask,
        _attempt: &Attempt,
        _state: &SupervisorState,
    ) -> SupervisorResult<AttemptPoll> {
        let input: AccountDeletionInput = input_of(task)?;
        let files = self.directory.files_owned_by(input.account_id).await?;
        let (deleted, pending): (Vec<StoredFile>, Vec<StoredFile>) =
            files.into_iter().partition(StoredFile::is_deleted);
        if pending.is_empty() {
            self.advance_anonymization(input.account_id, deleted.len())
                .await
        } else {
            self.advance_files(input.account_id, &pending).await
        }
    }
}

#[async_trait]
impl FunctionHandler for AccountDeletionWorkflow {
    async fn call(&self, function: HandlerId, args: Value) -> HandlerResult<Value> {
        match function {
            HandlerId::SuperviseAccountDeletion => supervise(&self.supervisor, self, args).await,
            other => Err(not_served(other, WorkflowKind::AccountDeletion)),
        }
    }
}
