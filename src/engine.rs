//! Composition root.
//!
//! [`Engine`] wires one [`EngineConfig`], one clock and the storage and
//! collaborator ports into the queue, the supervisor, every workflow and
//! the handler registry. Business callers use its kickoff entry points;
//! workers use [`Engine::queue`] and [`Engine::registry`].

use crate::clock::SharedClock;
use crate::config::{ConfigError, EngineConfig};
use crate::dispatch::{
    domain::{HandlerId, HandlerResult},
    services::{HandlerRegistry, HandlerRegistryBuilder, RegistryError},
};
use crate::queue::{
    adapters::{memory::InMemoryTaskStore, postgres::PostgresTaskStore},
    ports::TaskStore,
    services::{QueueService, SharedQueueService},
};
use crate::supervisor::{
    adapters::{memory::InMemoryWorkflowRepository, postgres::PostgresWorkflowRepository},
    domain::KeyStatus,
    ports::WorkflowRepository,
    services::{KickoffOutcome, SharedSupervisorService, SupervisorResult, SupervisorService},
};
use crate::workflows::{
    adapters::{memory::InMemoryTranscriptionRepository, postgres::PostgresTranscriptionRepository},
    domain::{AccountId, Channel, FileId, MessageId, NotificationRequest, RecordingId},
    ports::{
        AccountDirectory, RecordingLibrary, TranscriptionRepository, TranscriptionRepositoryResult,
    },
    services::{
        AccountDeletionStatus, AccountDeletionWorkflow, AnonymizationWorkflow,
        FileDeletionWorkflow, NotificationWorkflow, TranscriptionWebhook, TranscriptionWorkflow,
        WebhookReceipt,
    },
};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling an engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The handler registry is incomplete.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Storage and collaborator ports the engine runs on.
#[derive(Clone)]
pub struct EnginePorts {
    /// Queue storage.
    pub tasks: Arc<dyn TaskStore>,
    /// Workflow tasks, attempts and facts.
    pub workflows: Arc<dyn WorkflowRepository>,
    /// Transcription requests and responses.
    pub transcriptions: Arc<dyn TranscriptionRepository>,
    /// Accounts and files.
    pub directory: Arc<dyn AccountDirectory>,
    /// Recordings and transcripts.
    pub library: Arc<dyn RecordingLibrary>,
}

impl EnginePorts {
    /// Engine-owned storage held in memory.
    #[must_use]
    pub fn in_memory(
        directory: Arc<dyn AccountDirectory>,
        library: Arc<dyn RecordingLibrary>,
    ) -> Self {
        Self {
            tasks: Arc::new(InMemoryTaskStore::new()),
            workflows: Arc::new(InMemoryWorkflowRepository::new()),
            transcriptions: Arc::new(InMemoryTranscriptionRepository::new()),
            directory,
            library,
        }
    }

    /// Engine-owned storage in `PostgreSQL`, sharing one pool.
    #[must_use]
    pub fn postgres(
        pool: &Pool<ConnectionManager<PgConnection>>,
        directory: Arc<dyn AccountDirectory>,
        library: Arc<dyn RecordingLibrary>,
    ) -> Self {
        Self {
            tasks: Arc::new(PostgresTaskStore::new(pool.clone())),
            workflows: Arc::new(PostgresWorkflowRepository::new(pool.clone())),
            transcriptions: Arc::new(PostgresTranscriptionRepository::new(pool.clone())),
            directory,
            library,
        }
    }
}

/// The assembled workflow engine.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    clock: SharedClock,
    queue: SharedQueueService,
    supervisor: SharedSupervisorService,
    file_deletion: Arc<FileDeletionWorkflow>,
    anonymization: Arc<AnonymizationWorkflow>,
    account_deletion: Arc<AccountDeletionWorkflow>,
    email: Arc<NotificationWorkflow>,
    sms: Arc<NotificationWorkflow>,
    transcription: Arc<TranscriptionWorkflow>,
    webhook: TranscriptionWebhook,
    registry: HandlerRegistry,
}

impl Engine {
    /// Assembles the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when `config` fails validation and
    /// [`EngineError::Registry`] when a handler is left unregistered.
    pub fn new(
        config: EngineConfig,
        clock: SharedClock,
        ports: EnginePorts,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let queue: SharedQueueService = QueueService::new(ports.tasks, Arc::clone(&clock))
            .with_lease_duration(config.lease_duration());
        let supervisor: SharedSupervisorService =
            SupervisorService::new(ports.workflows, queue.clone(), Arc::clone(&clock))
                .with_max_runs(config.supervisor.max_runs);

        let file_deletion = Arc::new(FileDeletionWorkflow::new(
            supervisor.clone(),
            Arc::clone(&ports.directory),
            config.file_deletion,
        ));
        let anonymization = Arc::new(AnonymizationWorkflow::new(
            supervisor.clone(),
            Arc::clone(&ports.directory),
            config.account_anonymization,
        ));
        let account_deletion = Arc::new(AccountDeletionWorkflow::new(
            supervisor.clone(),
            Arc::clone(&ports.directory),
            Arc::clone(&file_deletion),
            Arc::clone(&anonymization),
            config.account_deletion,
        ));
        let email = Arc::new(NotificationWorkflow::new(
            supervisor.clone(),
            Channel::Email,
            config.email,
        ));
        let sms = Arc::new(NotificationWorkflow::new(
            supervisor.clone(),
            Channel::Sms,
            config.sms,
        ));
        let transcription = Arc::new(TranscriptionWorkflow::new(
            supervisor.clone(),
            ports.library,
            Arc::clone(&ports.transcriptions),
            config.transcription.clone(),
        ));
        let webhook = TranscriptionWebhook::new(ports.transcriptions, Arc::clone(&clock));

        let registry = HandlerRegistryBuilder::new()
            .register(file_deletion.clone(), FileDeletionWorkflow::HANDLERS)
            .register(anonymization.clone(), AnonymizationWorkflow::HANDLERS)
            .register(account_deletion.clone(), AccountDeletionWorkflow::HANDLERS)
            .register(email.clone(), email.handlers())
            .register(sms.clone(), sms.handlers())
            .register(transcription.clone(), TranscriptionWorkflow::HANDLERS)
            .build()?;
        tracing::info!(
            lease_secs = config.queue.lease_duration_secs,
            max_runs = config.supervisor.max_runs,
            "engine assembled"
        );

        Ok(Self {
            config,
            clock,
            queue,
            supervisor,
            file_deletion,
            anonymization,
            account_deletion,
            email,
            sms,
            transcription,
            webhook,
            registry,
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the engine clock.
    #[must_use]
    pub const fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Returns the queue service workers claim from.
    #[must_use]
    pub const fn queue(&self) -> &SharedQueueService {
        &self.queue
    }

    /// Returns the generic supervisor.
    #[must_use]
    pub const fn supervisor(&self) -> &SharedSupervisorService {
        &self.supervisor
    }

    /// Returns the handler registry workers dispatch through.
    #[must_use]
    pub const fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the account deletion workflow.
    #[must_use]
    pub fn account_deletion(&self) -> &AccountDeletionWorkflow {
        &self.account_deletion
    }

    /// Returns the transcription webhook receiver.
    #[must_use]
    pub const fn webhook(&self) -> &TranscriptionWebhook {
        &self.webhook
    }

    /// Invokes a registered function.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub async fn run_function(&self, function: HandlerId, args: Value) -> HandlerResult<Value> {
        self.registry.run_function(function, args).await
    }

    /// Starts deleting one file.
    ///
    /// # Errors
    ///
    /// Returns persistence and scheduling failures; invalid input is a
    /// [`KickoffOutcome::Rejected`].
    pub async fn kickoff_file_deletion(
        &self,
        file_id: FileId,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        self.file_deletion
            .kickoff_file_deletion(file_id, scheduled_at)
            .await
    }

    /// Returns whether the latest deletion of a file gave up.
    ///
    /// # Errors
    ///
    /// Returns persistence failures.
    pub async fn is_file_deletion_stuck(&self, file_id: FileId) -> SupervisorResult<bool> {
        self.file_deletion.is_file_deletion_stuck(file_id).await
    }

    /// Starts anonymizing one account.
    ///
    /// # Errors
    ///
    /// Returns persistence and scheduling failures; invalid input is a
    /// [`KickoffOutcome::Rejected`].
    pub async fn kickoff_account_anonymization(
        &self,
        account_id: AccountId,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        self.anonymization
            .kickoff_account_anonymization(account_id, scheduled_at)
            .await
    }

    /// Returns whether the latest anonymization of an account gave up.
    ///
    /// # Errors
    ///
    /// Returns persistence failures.
    pub async fn is_anonymization_stuck(&self, account_id: AccountId) -> SupervisorResult<bool> {
        self.anonymization.is_anonymization_stuck(account_id).await
    }

    /// Starts deleting an account: its files first, then its personal data.
    ///
    /// # Errors
    ///
    /// Returns persistence and scheduling failures; invalid input is a
    /// [`KickoffOutcome::Rejected`].
    pub async fn kickoff_account_deletion(
        &self,
        account_id: AccountId,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        self.account_deletion
            .kickoff_account_deletion(account_id, scheduled_at)
            .await
    }

    /// Returns whether every file an account owns is deleted.
    ///
    /// # Errors
    ///
    /// Returns collaborator failures.
    pub async fn all_files_deleted(&self, account_id: AccountId) -> SupervisorResult<bool> {
        self.account_deletion.all_files_deleted(account_id).await
    }

    /// Reports where an account deletion stands.
    ///
    /// # Errors
    ///
    /// Returns persistence and collaborator failures.
    pub async fn deletion_status(
        &self,
        account_id: AccountId,
    ) -> SupervisorResult<AccountDeletionStatus> {
        self.account_deletion.deletion_status(account_id).await
    }

    /// Queues an email.
    ///
    /// # Errors
    ///
    /// Returns persistence and scheduling failures; invalid requests are a
    /// [`KickoffOutcome::Rejected`].
    pub async fn kickoff_email(
        &self,
        request: &NotificationRequest,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        self.email.kickoff(request, scheduled_at).await
    }

    /// Queues a text message.
    ///
    /// # Errors
    ///
    /// Returns persistence and scheduling failures; invalid requests are a
    /// [`KickoffOutcome::Rejected`].
    pub async fn kickoff_sms(
        &self,
        request: &NotificationRequest,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        self.sms.kickoff(request, scheduled_at).await
    }

    /// Returns the delivery status of a message on `channel`.
    ///
    /// # Errors
    ///
    /// Returns persistence failures.
    pub async fn delivery_status(
        &self,
        channel: Channel,
        message_id: MessageId,
    ) -> SupervisorResult<KeyStatus> {
        match channel {
            Channel::Email => self.email.delivery_status(message_id).await,
            Channel::Sms => self.sms.delivery_status(message_id).await,
        }
    }

    /// Starts transcribing a recording.
    ///
    /// # Errors
    ///
    /// Returns persistence and scheduling failures; invalid input is a
    /// [`KickoffOutcome::Rejected`].
    pub async fn kickoff_transcription(
        &self,
        recording_id: RecordingId,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        self.transcription
            .kickoff_transcription(recording_id, scheduled_at)
            .await
    }

    /// Returns the status of the latest transcription of a recording.
    ///
    /// # Errors
    ///
    /// Returns persistence failures.
    pub async fn transcription_status(
        &self,
        recording_id: RecordingId,
    ) -> SupervisorResult<KeyStatus> {
        self.transcription.transcription_status(recording_id).await
    }

    /// Stores a raw transcription callback for later verification.
    ///
    /// # Errors
    ///
    /// Returns persistence failures only.
    pub async fn receive_transcription_webhook(
        &self,
        raw_body: &str,
        signature: &str,
    ) -> TranscriptionRepositoryResult<WebhookReceipt> {
        self.webhook.receive(raw_body, signature).await
    }
}
