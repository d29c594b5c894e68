//! Recording transcription through an asynchronous provider.
//!
//! Each attempt moves through `no request -> request sent -> response
//! received -> verified success | verified failure`, or times out when no
//! response arrives within the configured wait. The supervisor polls at a
//! fixed interval and carries the elapsed wait in its own state.

use super::support::{attempt_for, fact_document, input_of, not_served, provider_error, supervise};
use crate::config::TranscriptionConfig;
use crate::dispatch::{
    domain::{HandlerArgs, HandlerError, HandlerId, HandlerResult, decode_args},
    ports::FunctionHandler,
};
use crate::queue::domain::TaskKind;
use crate::supervisor::{
    domain::{
        Attempt, FactSnapshot, KeyStatus, RetryPolicy, SupervisorState, WorkflowKey, WorkflowKind,
        WorkflowTask,
    },
    services::{
        AttemptPoll, AttemptStart, KickoffOutcome, SharedSupervisorService, SupervisorError,
        SupervisorResult, Workflow,
    },
};
use crate::workflows::{
    domain::{
        RecordingId, TranscriptionRequest, TranscriptionResponse, parse_transcript,
        verify_signature,
    },
    ports::{
        CollaboratorError, RecordingLibrary, TranscriptionRepository,
        TranscriptionRepositoryError,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Input stored on each transcription task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionInput {
    /// Recording to transcribe.
    pub recording_id: RecordingId,
}

/// Supervised transcription of one recording.
#[derive(Clone)]
pub struct TranscriptionWorkflow {
    supervisor: SharedSupervisorService,
    library: Arc<dyn RecordingLibrary>,
    repository: Arc<dyn TranscriptionRepository>,
    config: TranscriptionConfig,
}

impl TranscriptionWorkflow {
    /// Functions this workflow serves.
    pub const HANDLERS: [HandlerId; 4] = [
        HandlerId::SuperviseTranscription,
        HandlerId::TranscriptionBefore,
        HandlerId::TranscriptionSuccess,
        HandlerId::TranscriptionError,
    ];

    /// Creates the workflow.
    #[must_use]
    pub const fn new(
        supervisor: SharedSupervisorService,
        library: Arc<dyn RecordingLibrary>,
        repository: Arc<dyn TranscriptionRepository>,
        config: TranscriptionConfig,
    ) -> Self {
        Self {
            supervisor,
            library,
            repository,
            config,
        }
    }

    /// Starts transcribing `recording_id` unless a run is already in
    /// progress.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence or scheduling fails.
    /// Unknown recordings are rejected as a value.
    pub async fn kickoff_transcription(
        &self,
        recording_id: RecordingId,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        if self.library.find_recording(recording_id).await?.is_none() {
            return Ok(KickoffOutcome::rejected(
                "unknown_recording",
                format!("recording {recording_id} does not exist"),
            ));
        }
        let document = serde_json::to_value(TranscriptionInput { recording_id })
            .map_err(SupervisorError::workflow)?;
        self.supervisor
            .kickoff(
                self,
                &recording_key(recording_id).to_string(),
                document,
                scheduled_at,
            )
            .await
    }

    /// Returns the status of the latest transcription of `recording_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence fails.
    pub async fn transcription_status(
        &self,
        recording_id: RecordingId,
    ) -> SupervisorResult<KeyStatus> {
        self.supervisor
            .key_status(
                WorkflowKind::RecordingTranscription,
                &recording_key(recording_id),
                &self.config.policy,
            )
            .await
    }

    /// Checks a stored callback and, when it holds up, stores the
    /// transcript. Signature age is measured when the supervisor checks it,
    /// not when the callback arrived.
    async fn settle(
        &self,
        input: TranscriptionInput,
        attempt: &Attempt,
        response: &TranscriptionResponse,
    ) -> SupervisorResult<AttemptPoll> {
        let Some(request) = self.repository.request_for_attempt(attempt.id).await? else {
            return Ok(AttemptPoll::Failed(
                "response received without a recorded request".to_owned(),
            ));
        };
        if let Err(err) = verify_signature(
            self.config.webhook_secret.expose(),
            &response.signature,
            &response.raw_body,
            self.supervisor.now(),
            self.config.signature_tolerance_secs,
        ) {
            return Ok(AttemptPoll::Failed(format!("signature rejected: {err}")));
        }
        let transcript = match parse_transcript(&response.raw_body) {
            Ok(transcript) => transcript,
            Err(err) => return Ok(AttemptPoll::Failed(err.to_string())),
        };
        if transcript.request_id != request.provider_request_id {
            return Ok(AttemptPoll::Failed(format!(
                "callback is for request {}, attempt sent {}",
                transcript.request_id, request.provider_request_id
            )));
        }
        match self
            .library
            .store_transcript(input.recording_id, &transcript.text, self.supervisor.now())
            .await
        {
            Ok(_) => Ok(AttemptPoll::Succeeded(json!({
                "provider_request_id": request.provider_request_id,
                "characters": transcript.text.chars().count(),
            }))),
            Err(CollaboratorError::UnknownRecording(id)) => Ok(AttemptPoll::Failed(format!(
                "recording {id} no longer exists"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn before(&self, args: HandlerArgs) -> HandlerResult<Value> {
        let context =
            attempt_for(&self.supervisor, &args, WorkflowKind::RecordingTranscription).await?;
        let input: TranscriptionInput = input_of(&context.task)?;
        let recording = self
            .library
            .find_recording(input.recording_id)
            .await?
            .ok_or_else(|| {
                HandlerError::Fatal(format!("recording {} not found", input.recording_id))
            })?;
        Ok(json!({
            "recording_id": recording.id,
            "audio_location": recording.audio_location,
            "model_id": self.config.model_id,
            "webhook": true,
        }))
    }

    async fn accepted(&self, args: HandlerArgs) -> HandlerResult<Value> {
        let context =
            attempt_for(&self.supervisor, &args, WorkflowKind::RecordingTranscription).await?;
        let input: TranscriptionInput = input_of(&context.task)?;
        let Some(provider_request_id) = args
            .response
            .get("request_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
        else {
            let inserted = self
                .supervisor
                .record_failure(args.attempt_id, "provider response lacks request_id")
                .await?;
            return Ok(fact_document(&inserted));
        };
        let request = TranscriptionRequest {
            attempt_id: args.attempt_id,
            recording_id: input.recording_id,
            provider_request_id: provider_request_id.to_owned(),
            created_at: self.supervisor.now(),
        };
        match self.repository.record_request(&request).await {
            Ok(recorded) => {
                tracing::info!(
                    attempt_id = %args.attempt_id,
                    provider_request_id,
                    recorded,
                    "transcription request recorded"
                );
                Ok(json!({ "request": if recorded { "recorded" } else { "already_recorded" } }))
            }
            Err(TranscriptionRepositoryError::DuplicateProviderRequest(id)) => {
                let inserted = self
                    .supervisor
                    .record_failure(
                        args.attempt_id,
                        format!("provider request {id} belongs to another attempt"),
                    )
                    .await?;
                Ok(fact_document(&inserted))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn refused(&self, args: HandlerArgs) -> HandlerResult<Value> {
        attempt_for(&self.supervisor, &args, WorkflowKind::RecordingTranscription).await?;
        let inserted = self
            .supervisor
            .record_failure(args.attempt_id, provider_error(&args))
            .await?;
        Ok(fact_document(&inserted))
    }
}

fn recording_key(recording_id: RecordingId) -> WorkflowKey {
    WorkflowKey::from_uuid(recording_id.into_inner())
}

#[async_trait]
impl Workflow for TranscriptionWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::RecordingTranscription
    }

    fn policy(&self) -> RetryPolicy {
        self.config.policy
    }

    fn supervisor_handler(&self) -> HandlerId {
        HandlerId::SuperviseTranscription
    }

    async fn is_satisfied(&self, task: &WorkflowTask) -> SupervisorResult<bool> {
        let input: TranscriptionInput = input_of(task)?;
        let recording = self.library.find_recording(input.recording_id).await?;
        Ok(recording.is_none_or(|stored| stored.is_transcribed()))
    }

    async fn start_attempt(
        &self,
        _task: &WorkflowTask,
        attempt: &Attempt,
    ) -> SupervisorResult<AttemptStart> {
        self.supervisor
            .dispatch_side_effect(
                TaskKind::TranscriptionKickoff,
                attempt,
                [
                    HandlerId::TranscriptionBefore,
                    HandlerId::TranscriptionSuccess,
                    HandlerId::TranscriptionError,
                ],
            )
            .await?;
        Ok(AttemptStart::Dispatched)
    }

    async fn poll_attempt(
        &self,
        task: &WorkflowTask,
        attempt: &Attempt,
        state: &SupervisorState,
    ) -> SupervisorResult<AttemptPoll> {
        let input: TranscriptionInput = input_of(task)?;
        if let Some(response) = self.repository.response_for_attempt(attempt.id).await? {
            return self.settle(input, attempt, &response).await;
        }
        if state.waited_secs >= self.config.max_wait_secs {
            tracing::warn!(
                workflow_task_id = %task.id(),
                attempt_id = %attempt.id,
                waited_secs = state.waited_secs,
                "transcription response timed out"
            );
            return Ok(AttemptPoll::Failed(format!(
                "no transcription response within {}s",
                self.config.max_wait_secs
            )));
        }
        Ok(AttemptPoll::Pending)
    }

    fn recheck_delay(&self, _facts: &FactSnapshot, _state: &SupervisorState) -> u64 {
        self.config.poll_interval_secs
    }
}

#[async_trait]
impl FunctionHandler for TranscriptionWorkflow {
    async fn call(&self, function: HandlerId, args: Value) -> HandlerResult<Value> {
        match function {
            HandlerId::SuperviseTranscription => supervise(&self.supervisor, self, args).await,
            HandlerId::TranscriptionBefore => self.before(decode_args(args)?).await,
            HandlerId::TranscriptionSuccess => self.accepted(decode_args(args)?).await,
            HandlerId::TranscriptionError => self.refused(decode_args(args)?).await,
            other => Err(not_served(other, WorkflowKind::RecordingTranscription)),
        }
    }
}
