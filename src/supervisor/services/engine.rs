//! The generic supervisor: kickoff, invocation, and fact recording.

use super::{AttemptPoll, AttemptStart, SupervisorError, SupervisorResult, Workflow};
use crate::dispatch::domain::{FunctionCall, HandlerId, SideEffectEnvelope};
use crate::queue::{
    domain::{QueueTask, TaskKind},
    services::SharedQueueService,
};
use crate::supervisor::{
    domain::{
        Attempt, AttemptId, AttemptOutcome, Decision, ExhaustionPolicy, FactInsert, FactSnapshot,
        KeyStatus, RetryPolicy, SupervisorDomainError, SupervisorState, WorkflowKey, WorkflowKind,
        WorkflowTask, WorkflowTaskId, decide, duration_from_secs,
    },
    ports::{CreateOutcome, WorkflowRepository},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Default cap on invocations of one supervisor.
pub const DEFAULT_MAX_SUPERVISOR_RUNS: u32 = 500;

/// Fact-derivation passes allowed per invocation.
///
/// One invocation may resolve an outstanding attempt, start the next one and
/// poll it once when it runs inline.
const MAX_PASSES: usize = 4;

/// Supervisor service over type-erased repository and clock.
pub type SharedSupervisorService =
    SupervisorService<dyn WorkflowRepository, dyn Clock + Send + Sync>;

/// A rejected kickoff, returned as a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Machine-readable failure code.
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationFailure {
    /// Creates a validation failure.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<SupervisorDomainError> for ValidationFailure {
    fn from(err: SupervisorDomainError) -> Self {
        let code = match err {
            SupervisorDomainError::EmptyKey => "empty_key",
            SupervisorDomainError::KeyTooLong { .. } => "key_too_long",
            SupervisorDomainError::RunawaySupervisor { .. } => "runaway_supervisor",
        };
        Self::new(code, err.to_string())
    }
}

/// Result of an idempotent kickoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum KickoffOutcome {
    /// A new workflow task was created and its supervisor scheduled.
    Started {
        /// Created task.
        workflow_task_id: WorkflowTaskId,
    },
    /// A task for the key is still in progress; nothing was created.
    AlreadyInProgress {
        /// Existing task.
        workflow_task_id: WorkflowTaskId,
    },
    /// Input was rejected.
    Rejected {
        /// Why the input was rejected.
        failure: ValidationFailure,
    },
}

impl KickoffOutcome {
    /// Builds a rejection.
    #[must_use]
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            failure: ValidationFailure::new(code, message),
        }
    }

    /// Returns the workflow task behind the outcome, if any.
    #[must_use]
    pub const fn workflow_task_id(&self) -> Option<WorkflowTaskId> {
        match self {
            Self::Started { workflow_task_id } | Self::AlreadyInProgress { workflow_task_id } => {
                Some(*workflow_task_id)
            }
            Self::Rejected { .. } => None,
        }
    }

    /// Returns the validation failure, if the kickoff was rejected.
    #[must_use]
    pub const fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Rejected { failure } => Some(failure),
            Self::Started { .. } | Self::AlreadyInProgress { .. } => None,
        }
    }
}

/// Result of one supervisor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SupervisorOutcome {
    /// A success fact exists.
    Succeeded,
    /// The retry budget is spent and the failure is surfaced.
    Failed {
        /// Failure facts recorded.
        failures: u32,
    },
    /// The retry budget is spent and the failure is absorbed.
    Absorbed {
        /// Failure facts recorded.
        failures: u32,
    },
    /// A recheck was queued.
    Rescheduled {
        /// When the recheck becomes due.
        at: DateTime<Utc>,
    },
    /// The workflow task does not exist.
    Missing,
}

impl SupervisorOutcome {
    /// Returns whether no further invocation is scheduled.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Rescheduled { .. })
    }
}

/// A workflow task together with one of its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptContext {
    /// Owning workflow task.
    pub task: WorkflowTask,
    /// The attempt.
    pub attempt: Attempt,
}

/// Runs supervisors and records the facts they reason over.
pub struct SupervisorService<R, C>
where
    R: WorkflowRepository + ?Sized,
    C: Clock + Send + Sync + ?Sized,
{
    repository: Arc<R>,
    queue: SharedQueueService,
    clock: Arc<C>,
    max_runs: u32,
}

impl<R, C> Clone for SupervisorService<R, C>
where
    R: WorkflowRepository + ?Sized,
    C: Clock + Send + Sync + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            queue: self.queue.clone(),
            clock: Arc::clone(&self.clock),
            max_runs: self.max_runs,
        }
    }
}

impl<R, C> SupervisorService<R, C>
where
    R: WorkflowRepository + ?Sized,
    C: Clock + Send + Sync + ?Sized,
{
    /// Creates a supervisor service with the default run cap.
    #[must_use]
    pub const fn new(repository: Arc<R>, queue: SharedQueueService, clock: Arc<C>) -> Self {
        Self {
            repository,
            queue,
            clock,
            max_runs: DEFAULT_MAX_SUPERVISOR_RUNS,
        }
    }

    /// Overrides the cap on invocations of one supervisor.
    #[must_use]
    pub const fn with_max_runs(mut self, max_runs: u32) -> Self {
        self.max_runs = max_runs;
        self
    }

    /// Returns the underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Returns the queue used for scheduling.
    #[must_use]
    pub const fn queue(&self) -> &SharedQueueService {
        &self.queue
    }

    /// Returns the current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Creates a workflow task for `key` unless one is in progress, and
    /// schedules its first supervisor invocation at `scheduled_at`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when persistence or scheduling fails.
    /// Invalid keys are reported as [`KickoffOutcome::Rejected`].
    pub async fn kickoff(
        &self,
        workflow: &dyn Workflow,
        key: &str,
        input: Value,
        scheduled_at: DateTime<Utc>,
    ) -> SupervisorResult<KickoffOutcome> {
        let kind = workflow.kind();
        let workflow_key = match WorkflowKey::new(key) {
            Ok(valid) => valid,
            Err(err) => {
                return Ok(KickoffOutcome::Rejected {
                    failure: err.into(),
                });
            }
        };
        let task = WorkflowTask::new(kind, workflow_key, input, &*self.clock);
        let policy = workflow.policy();
        match self
            .repository
            .create_if_idle(&task, policy.max_attempts)
            .await?
        {
            CreateOutcome::InProgress(existing) => {
                tracing::debug!(
                    kind = %kind,
                    key = %task.key(),
                    workflow_task_id = %existing,
                    "kickoff skipped, task in progress"
                );
                Ok(KickoffOutcome::AlreadyInProgress {
                    workflow_task_id: existing,
                })
            }
            CreateOutcome::Created(id) => {
                self.schedule(
                    workflow.supervisor_handler(),
                    &SupervisorState::initial(id),
                    scheduled_at,
                )
                .await?;
                tracing::info!(
                    kind = %kind,
                    key = %task.key(),
                    workflow_task_id = %id,
                    scheduled_at = %scheduled_at,
                    "workflow kicked off"
                );
                Ok(KickoffOutcome::Started {
                    workflow_task_id: id,
                })
            }
        }
    }

    /// Runs one supervisor invocation under the workflow task's lock.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Domain`] when the run cap is exceeded,
    /// [`SupervisorError::KindMismatch`] when `state` names a task of another
    /// workflow, or the underlying persistence and scheduling errors.
    pub async fn invoke(
        &self,
        workflow: &dyn Workflow,
        state: SupervisorState,
    ) -> SupervisorResult<SupervisorOutcome> {
        let task_id = state.workflow_task_id;
        let _lock = self.repository.lock(task_id).await?;
        let mut current = state.begin_run(self.max_runs).inspect_err(|err| {
            tracing::error!(workflow_task_id = %task_id, error = %err, "supervisor tripwire");
        })?;
        let Some(task) = self.repository.find_task(task_id).await? else {
            tracing::warn!(workflow_task_id = %task_id, "supervised task missing");
            return Ok(SupervisorOutcome::Missing);
        };
        if task.kind() != workflow.kind() {
            return Err(SupervisorError::KindMismatch {
                workflow_task_id: task_id,
                expected: workflow.kind(),
                actual: task.kind(),
            });
        }

        let policy = workflow.policy();
        let mut started_this_run = false;
        let mut facts = FactSnapshot::default();
        for _ in 0..MAX_PASSES {
            facts = FactSnapshot::derive(&self.repository.attempt_history(task_id).await?);
            let domain_done = !facts.has_succeeded() && workflow.is_satisfied(&task).await?;
            match decide(&facts, &policy, domain_done) {
                Decision::Succeeded => return Ok(SupervisorOutcome::Succeeded),
                Decision::RecordSuccess => {
                    let attempt = match facts.open_attempt.clone() {
                        Some(open) => open,
                        None => self.append_attempt(&task, facts.attempt_count).await?,
                    };
                    self.record_own_fact(AttemptOutcome::Succeeded {
                        attempt_id: attempt.id,
                        detail: json!({ "satisfied": true }),
                        recorded_at: self.now(),
                    })
                    .await?;
                    return Ok(SupervisorOutcome::Succeeded);
                }
                Decision::Exhausted => return Ok(exhausted(&task, &facts, &policy)),
                Decision::StartAttempt => {
                    if started_this_run {
                        break;
                    }
                    let attempt = self.append_attempt(&task, facts.attempt_count).await?;
                    started_this_run = true;
                    current = current.fresh_attempt();
                    if workflow.start_attempt(&task, &attempt).await? == AttemptStart::Dispatched {
                        break;
                    }
                }
                Decision::AwaitAttempt(attempt) => {
                    match workflow.poll_attempt(&task, &attempt, &current).await? {
                        AttemptPoll::Pending => break,
                        AttemptPoll::Succeeded(detail) => {
                            self.record_own_fact(AttemptOutcome::Succeeded {
                                attempt_id: attempt.id,
                                detail,
                                recorded_at: self.now(),
                            })
                            .await?;
                        }
                        AttemptPoll::Failed(reason) => {
                            self.record_own_fact(AttemptOutcome::Failed {
                                attempt_id: attempt.id,
                                reason,
                                recorded_at: self.now(),
                            })
                            .await?;
                        }
                    }
                }
            }
        }

        let delay = workflow.recheck_delay(&facts, &current);
        let at = self.now() + duration_from_secs(delay);
        self.schedule(workflow.supervisor_handler(), &current.waiting(delay), at)
            .await?;
        tracing::debug!(
            workflow_task_id = %task_id,
            kind = %task.kind(),
            run_count = current.run_count,
            failures = facts.failure_count,
            recheck_at = %at,
            "supervisor rescheduled"
        );
        Ok(SupervisorOutcome::Rescheduled { at })
    }

    /// Returns the status of the latest task for a kind and key.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Repository`] when persistence fails.
    pub async fn key_status(
        &self,
        kind: WorkflowKind,
        key: &WorkflowKey,
        policy: &RetryPolicy,
    ) -> SupervisorResult<KeyStatus> {
        let tasks = self.repository.tasks_for_key(kind, key).await?;
        let Some(latest) = tasks.last() else {
            return Ok(KeyStatus::Idle);
        };
        let history = self.repository.attempt_history(latest.id()).await?;
        Ok(KeyStatus::classify(
            latest.id(),
            &FactSnapshot::derive(&history),
            policy,
        ))
    }

    /// Returns whether the latest task for a kind and key gave up.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Repository`] when persistence fails.
    pub async fn is_stuck(
        &self,
        kind: WorkflowKind,
        key: &WorkflowKey,
        policy: &RetryPolicy,
    ) -> SupervisorResult<bool> {
        Ok(self.key_status(kind, key, policy).await?.is_stuck())
    }

    /// Records a success fact for an attempt. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Repository`] when the attempt is unknown or
    /// persistence fails.
    pub async fn record_success(
        &self,
        attempt_id: AttemptId,
        detail: Value,
    ) -> SupervisorResult<FactInsert> {
        self.record_fact(AttemptOutcome::Succeeded {
            attempt_id,
            detail,
            recorded_at: self.now(),
        })
        .await
    }

    /// Records a failure fact for an attempt. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Repository`] when the attempt is unknown or
    /// persistence fails.
    pub async fn record_failure(
        &self,
        attempt_id: AttemptId,
        reason: impl Into<String>,
    ) -> SupervisorResult<FactInsert> {
        self.record_fact(AttemptOutcome::Failed {
            attempt_id,
            reason: reason.into(),
            recorded_at: self.now(),
        })
        .await
    }

    /// Loads an attempt with its owning task.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Repository`] when persistence fails.
    pub async fn attempt_context(
        &self,
        attempt_id: AttemptId,
    ) -> SupervisorResult<Option<AttemptContext>> {
        let Some(attempt) = self.repository.find_attempt(attempt_id).await? else {
            return Ok(None);
        };
        let task = self.repository.find_task(attempt.workflow_task_id).await?;
        Ok(task.map(|task| AttemptContext { task, attempt }))
    }

    /// Returns the derived facts for a workflow task.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Repository`] when persistence fails.
    pub async fn facts(&self, task_id: WorkflowTaskId) -> SupervisorResult<FactSnapshot> {
        let history = self.repository.attempt_history(task_id).await?;
        Ok(FactSnapshot::derive(&history))
    }

    /// Queues a provider task whose handlers report back on `attempt`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Queue`] when enqueueing fails.
    pub async fn dispatch_side_effect(
        &self,
        kind: TaskKind,
        attempt: &Attempt,
        handlers: [HandlerId; 3],
    ) -> SupervisorResult<QueueTask> {
        let [before_handler, success_handler, error_handler] = handlers;
        let envelope = SideEffectEnvelope {
            workflow_task_id: attempt.workflow_task_id,
            attempt_id: attempt.id,
            before_handler,
            success_handler,
            error_handler,
        };
        let payload = serde_json::to_value(&envelope).map_err(SupervisorError::workflow)?;
        let task = self.queue.enqueue(kind, payload, self.now()).await?;
        tracing::info!(
            task_id = %task.id(),
            kind = %kind,
            workflow_task_id = %attempt.workflow_task_id,
            attempt_id = %attempt.id,
            "side effect queued"
        );
        Ok(task)
    }

    /// Queues a registered function to run as soon as a worker is free.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Queue`] when enqueueing fails.
    pub async fn dispatch_function(
        &self,
        function: HandlerId,
        args: &impl Serialize,
    ) -> SupervisorResult<QueueTask> {
        self.enqueue_call(function, args, self.now()).await
    }

    async fn schedule(
        &self,
        handler: HandlerId,
        state: &SupervisorState,
        at: DateTime<Utc>,
    ) -> SupervisorResult<QueueTask> {
        self.enqueue_call(handler, state, at).await
    }

    async fn enqueue_call(
        &self,
        function: HandlerId,
        args: &(impl Serialize + ?Sized),
        at: DateTime<Utc>,
    ) -> SupervisorResult<QueueTask> {
        let call = FunctionCall::new(function, args).map_err(SupervisorError::workflow)?;
        let payload = serde_json::to_value(&call).map_err(SupervisorError::workflow)?;
        Ok(self.queue.enqueue(TaskKind::DbFunction, payload, at).await?)
    }

    async fn append_attempt(
        &self,
        task: &WorkflowTask,
        previous_attempts: u32,
    ) -> SupervisorResult<Attempt> {
        let attempt = Attempt::next(task.id(), previous_attempts, self.now());
        self.repository.append_attempt(&attempt).await?;
        tracing::info!(
            workflow_task_id = %task.id(),
            kind = %task.kind(),
            attempt_id = %attempt.id,
            attempt_number = attempt.number,
            "attempt started"
        );
        Ok(attempt)
    }

    async fn record_fact(&self, outcome: AttemptOutcome) -> SupervisorResult<FactInsert> {
        let inserted = self.repository.record_outcome(&outcome).await?;
        match &inserted {
            FactInsert::Recorded => tracing::info!(
                attempt_id = %outcome.attempt_id(),
                outcome = outcome.label(),
                "fact recorded"
            ),
            FactInsert::AlreadyRecorded => tracing::debug!(
                attempt_id = %outcome.attempt_id(),
                outcome = outcome.label(),
                "fact already recorded"
            ),
            FactInsert::Contradicted(existing) => tracing::warn!(
                attempt_id = %outcome.attempt_id(),
                outcome = outcome.label(),
                existing = existing.label(),
                "fact ignored, attempt already resolved"
            ),
        }
        Ok(inserted)
    }

    async fn record_own_fact(&self, outcome: AttemptOutcome) -> SupervisorResult<()> {
        let attempt_id = outcome.attempt_id();
        match self.record_fact(outcome).await? {
            FactInsert::Contradicted(existing) => Err(SupervisorError::ContradictedFact {
                attempt_id,
                existing: existing.label(),
            }),
            FactInsert::Recorded | FactInsert::AlreadyRecorded => Ok(()),
        }
    }
}

fn exhausted(task: &WorkflowTask, facts: &FactSnapshot, policy: &RetryPolicy) -> SupervisorOutcome {
    let failures = facts.failure_count;
    match policy.on_exhausted {
        ExhaustionPolicy::Surface => {
            tracing::warn!(
                workflow_task_id = %task.id(),
                kind = %task.kind(),
                key = %task.key(),
                failures,
                "workflow gave up"
            );
            SupervisorOutcome::Failed { failures }
        }
        ExhaustionPolicy::Absorb => {
            tracing::info!(
                workflow_task_id = %task.id(),
                kind = %task.kind(),
                failures,
                "workflow gave up, failure absorbed"
            );
            SupervisorOutcome::Absorbed { failures }
        }
    }
}
