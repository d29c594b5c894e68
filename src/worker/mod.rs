//! Reference in-process worker.
//!
//! Production deployments run the worker as an external collaborator. This
//! one claims tasks from the same queue contract and is used by the test
//! suite and for local development. It never hard-codes business logic:
//! `db_function` tasks go straight to the handler registry, and provider
//! tasks are driven through the before, success and error handlers their
//! payload names.
//!
//! Handler failures are settled by retryability. A retryable failure is
//! logged and the task is left for its lease to expire, so it is claimed
//! again later. Any other failure is logged and the task is completed.

use crate::dispatch::{
    domain::{
        FunctionCall, HandlerArgs, HandlerError, HandlerId, HandlerResult, SideEffectEnvelope,
        decode_args,
    },
    services::HandlerRegistry,
};
use crate::engine::Engine;
use crate::queue::{
    domain::{QueueTask, QueueTaskId, TaskKind},
    services::{QueueError, SharedQueueService},
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Failure reported by an external provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("provider failed: {0}")]
pub struct ProviderError(pub String);

/// Performs the external side effect of a provider task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Sends `input` to the provider serving `kind` and returns its response.
    async fn perform(&self, kind: TaskKind, input: Value) -> Result<Value, ProviderError>;
}

/// Errors that stop a worker iteration.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The queue could not be read or settled.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// What one worker iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkReport {
    /// No task was available.
    Idle,
    /// The task ran and was completed.
    Completed {
        /// Task that ran.
        task_id: QueueTaskId,
        /// Its kind.
        kind: TaskKind,
    },
    /// The task hit a retryable failure and was left for lease expiry.
    Retrying {
        /// Task that ran.
        task_id: QueueTaskId,
        /// Its kind.
        kind: TaskKind,
        /// What went wrong.
        error: HandlerError,
    },
    /// The task failed permanently and was completed.
    Failed {
        /// Task that ran.
        task_id: QueueTaskId,
        /// Its kind.
        kind: TaskKind,
        /// What went wrong.
        error: HandlerError,
    },
}

impl WorkReport {
    /// Returns whether a task was claimed.
    #[must_use]
    pub const fn claimed_task(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Claims and runs queued tasks.
#[derive(Clone)]
pub struct Worker {
    queue: SharedQueueService,
    registry: HandlerRegistry,
    gateway: Arc<dyn ProviderGateway>,
}

impl Worker {
    /// Creates a worker over a queue and registry.
    #[must_use]
    pub const fn new(
        queue: SharedQueueService,
        registry: HandlerRegistry,
        gateway: Arc<dyn ProviderGateway>,
    ) -> Self {
        Self {
            queue,
            registry,
            gateway,
        }
    }

    /// Creates a worker for an assembled engine.
    #[must_use]
    pub fn for_engine(engine: &Engine, gateway: Arc<dyn ProviderGateway>) -> Self {
        Self::new(engine.queue().clone(), engine.registry().clone(), gateway)
    }

    /// Claims and runs at most one task.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Queue`] when claiming or settling fails.
    pub async fn run_once(&self) -> Result<WorkReport, WorkerError> {
        let Some((task, _lease)) = self.queue.dequeue_next_available_task().await? else {
            return Ok(WorkReport::Idle);
        };
        let task_id = task.id();
        let kind = task.kind();
        let outcome = if kind.requires_provider() {
            self.drive_side_effect(&task).await
        } else {
            self.run_call(&task).await
        };
        match outcome {
            Ok(()) => {
                self.queue.complete_task(task_id).await?;
                Ok(WorkReport::Completed { task_id, kind })
            }
            Err(error) if error.is_retryable() => {
                self.queue
                    .fail_task(Some(task_id), error.to_string())
                    .await?;
                Ok(WorkReport::Retrying {
                    task_id,
                    kind,
                    error,
                })
            }
            Err(error) => {
                tracing::error!(task_id = %task_id, kind = %kind, error = %error, "task failed");
                self.queue
                    .fail_task(Some(task_id), error.to_string())
                    .await?;
                self.queue.complete_task(task_id).await?;
                Ok(WorkReport::Failed {
                    task_id,
                    kind,
                    error,
                })
            }
        }
    }

    /// Runs tasks until none is available or `limit` tasks have run.
    ///
    /// Returns the number of tasks claimed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Queue`] when claiming or settling fails.
    pub async fn run_until_idle(&self, limit: usize) -> Result<usize, WorkerError> {
        let mut claimed = 0;
        while claimed < limit {
            if !self.run_once().await?.claimed_task() {
                break;
            }
            claimed += 1;
        }
        Ok(claimed)
    }

    /// Polls the queue until `shutdown` flips to `true` or its sender is
    /// dropped, sleeping `poll_interval` whenever the queue is empty.
    ///
    /// Queue failures are logged and retried after the poll interval.
    pub async fn run(&self, poll_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(poll_ms = poll_interval.as_millis(), "worker started");
        while !*shutdown.borrow() {
            let idle = match self.run_once().await {
                Ok(report) => !report.claimed_task(),
                Err(err) => {
                    tracing::error!(error = %err, "worker iteration failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    () = tokio::time::sleep(poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        tracing::info!("worker stopped");
    }

    async fn run_call(&self, task: &QueueTask) -> HandlerResult<()> {
        let call: FunctionCall = decode_args(task.payload().clone())?;
        self.registry.run_function(call.function, call.args).await?;
        Ok(())
    }

    async fn drive_side_effect(&self, task: &QueueTask) -> HandlerResult<()> {
        let envelope: SideEffectEnvelope = decode_args(task.payload().clone())?;
        let input = match self
            .call_handler(envelope.before_handler, &envelope.before_args())
            .await
        {
            Ok(input) => input,
            Err(err) if err.is_retryable() => return Err(err),
            Err(err) => {
                self.call_handler(envelope.error_handler, &envelope.error_args(err.to_string()))
                    .await?;
                return Err(err);
            }
        };
        match self.gateway.perform(task.kind(), input).await {
            Ok(response) => {
                self.call_handler(envelope.success_handler, &envelope.success_args(response))
                    .await?;
            }
            Err(err) => {
                tracing::warn!(
                    task_id = %task.id(),
                    kind = %task.kind(),
                    attempt_id = %envelope.attempt_id,
                    error = %err,
                    "provider call failed"
                );
                self.call_handler(envelope.error_handler, &envelope.error_args(err.0))
                    .await?;
            }
        }
        Ok(())
    }

    async fn call_handler(&self, function: HandlerId, args: &HandlerArgs) -> HandlerResult<Value> {
        let payload = serde_json::to_value(args).map_err(HandlerError::invalid_payload)?;
        self.registry.run_function(function, payload).await
    }
}
