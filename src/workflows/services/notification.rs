//! Email and text message delivery.
//!
//! One workflow type serves both channels. Exhausting the retry budget is
//! absorbed by default, so a bounced notification never blocks anything
//! that depends on it.

use super::support::{attempt_for, fact_document, input_of, not_served, provider_error, supervise};
use crate::dispatch::{
    domain::{HandlerArgs, HandlerError, HandlerId, HandlerResult, decode_args},
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
use crate::workflows::domain::{Channel, MessageId, NotificationRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

/// Supervised delivery of messages on one channel.
#[derive(Clone)]
pub struct NotificationWorkflow {
    supervisor: SharedSupervisorService,
    channel: Channel,
    policy: RetryPolicy,
}

impl NotificationWorkflow {
    /// Functions served by the email workflow.
    pub const EMAIL_HANDLERS: [HandlerId; 4] = [
        HandlerId::SuperviseEmailSend,
        HandlerId::EmailBefore,
        HandlerId::EmailSuccess,
        HandlerId::EmailError,
    ];

    /// Functions served by the text message workflow.
    pub const SMS_HANDLERS: [HandlerId; 4] = [
        HandlerId::SuperviseSmsSend,
        HandlerId::SmsBefore,
        HandlerId::SmsSuccess,
        HandlerId::SmsError,
    ];

    /// Creates the workflow for `channel`.
    #[must_use]
    pub const fn new(
        supervisor: SharedSupervisorService,
        channel: Channel,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            supervisor,
            channel,
            policy,
        }
    }

    /// Returns the channel served.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Returns the functions this instance serves.
    #[must_use]
    pub const fn handlers(&self) -> [HandlerId; 4] {
        match self.channel {
            Channel::Email => Self::EMAIL_HANDLERS,
            Channel::Sms => Self::SMS_HANDLERS,
        }
    }

    /// Queues delivery of `request` unless its message is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence or scheduling fails.
    /// Invalid recipients and templates are rejected as a value.
    pub async fn kickoff(
        &self,
        request: &NotificationRequest,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        if let Err(failure) = request.validate(self.channel) {
            return Ok(KickoffOutcome::Rejected { failure });
        }
        let document = serde_json::to_value(request).map_err(SupervisorError::workflow)?;
        self.supervisor
            .kickoff(
                self,
                &message_key(request.message_id).to_string(),
                document,
                scheduled_at,
            )
            .await
    }

    /// Returns the delivery status of a message.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence fails.
    pub async fn delivery_status(&self, message_id: MessageId) -> SupervisorResult<KeyStatus> {
        self.supervisor
            .key_status(self.kind(), &message_key(message_id), &self.policy)
            .await
    }

    async fn render(&self, args: HandlerArgs) -> HandlerResult<Value> {
        let context = attempt_for(&self.supervisor, &args, self.kind()).await?;
        let request: NotificationRequest = input_of(&context.task)?;
        request
            .render(self.channel)
            .map_err(|err| HandlerError::Fatal(format!("template failed to render: {err}")))
    }

    async fn delivered(&self, args: HandlerArgs) -> HandlerResult<Value> {
        attempt_for(&self.supervisor, &args, self.kind()).await?;
        let inserted = self
            .supervisor
            .record_success(args.attempt_id, json!({ "response": args.response }))
            .await?;
        Ok(fact_document(&inserted))
    }

    async fn rejected(&self, args: HandlerArgs) -> HandlerResult<Value> {
        attempt_for(&self.supervisor, &args, self.kind()).await?;
        let inserted = self
            .supervisor
            .record_failure(args.attempt_id, provider_error(&args))
            .await?;
        Ok(fact_document(&inserted))
    }
}

fn message_key(message_id: MessageId) -> WorkflowKey {
    WorkflowKey::from_uuid(message_id.into_inner())
}

#[async_trait]
impl Workflow for NotificationWorkflow {
    fn kind(&self) -> WorkflowKind {
        match self.channel {
            Channel::Email => WorkflowKind::EmailSend,
            Channel::Sms => WorkflowKind::SmsSend,
        }
    }

    fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn supervisor_handler(&self) -> HandlerId {
        let [supervise_handler, ..] = self.handlers();
        supervise_handler
    }

    async fn is_satisfied(&self, _task: &WorkflowTask) -> SupervisorResult<bool> {
        Ok(false)
    }

    async fn start_attempt(
        &self,
        _task: &WorkflowTask,
        attempt: &Attempt,
    ) -> SupervisorResult<AttemptStart> {
        let [_, before, success, error] = self.handlers();
        let kind = match self.channel {
            Channel::Email => TaskKind::Email,
            Channel::Sms => TaskKind::Sms,
        };
        self.supervisor
            .dispatch_side_effect(kind, attempt, [before, success, error])
            .await?;
        Ok(AttemptStart::Dispatched)
    }
}

#[async_trait]
impl FunctionHandler for NotificationWorkflow {
    async fn call(&self, function: HandlerId, args: Value) -> HandlerResult<Value> {
        let [supervise_handler, before, success, error] = self.handlers();
        if function == supervise_handler {
            supervise(&self.supervisor, self, args).await
        } else if function == before {
            self.render(decode_args(args)?).await
        } else if function == success {
            self.delivered(decode_args(args)?).await
        } else if function == error {
            self.rejected(decode_args(args)?).await
        } else {
            Err(not_served(function, self.kind()))
        }
    }
}
