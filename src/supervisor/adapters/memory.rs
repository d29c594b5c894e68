//! In-memory workflow repository for tests and single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::supervisor::{
    domain::{
        Attempt, AttemptId, AttemptOutcome, AttemptRecord, FactInsert, FactSnapshot, RetryPolicy,
        WorkflowKey, WorkflowKind, WorkflowTask, WorkflowTaskId,
    },
    ports::{
        CreateOutcome, WorkflowLock, WorkflowRepository, WorkflowRepositoryError,
        WorkflowRepositoryResult,
    },
};

/// Thread-safe in-memory workflow repository.
///
/// Per-task locks are async mutexes so a supervisor can hold one across
/// awaits without blocking the runtime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowRepository {
    state: Arc<RwLock<InMemoryWorkflowState>>,
    locks: LockTable,
}

#[derive(Debug, Default)]
struct InMemoryWorkflowState {
    tasks: HashMap<WorkflowTaskId, WorkflowTask>,
    key_index: HashMap<(WorkflowKind, WorkflowKey), Vec<WorkflowTaskId>>,
    attempts: HashMap<WorkflowTaskId, Vec<Attempt>>,
    attempt_owner: HashMap<AttemptId, WorkflowTaskId>,
    outcomes: HashMap<AttemptId, AttemptOutcome>,
}

impl InMemoryWorkflowState {
    fn history(&self, task_id: WorkflowTaskId) -> Vec<AttemptRecord> {
        let mut records: Vec<AttemptRecord> = self
            .attempts
            .get(&task_id)
            .map(|attempts| {
                attempts
                    .iter()
                    .map(|attempt| AttemptRecord {
                        attempt: attempt.clone(),
                        outcome: self.outcomes.get(&attempt.id).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|record| record.attempt.number);
        records
    }

    fn in_progress_for(
        &self,
        kind: WorkflowKind,
        key: &WorkflowKey,
        policy: &RetryPolicy,
    ) -> Option<WorkflowTaskId> {
        self.key_index
            .get(&(kind, key.clone()))?
            .iter()
            .rev()
            .copied()
            .find(|id| FactSnapshot::derive(&self.history(*id)).is_in_progress(policy))
    }
}

impl InMemoryWorkflowRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> WorkflowRepositoryResult<RwLockReadGuard<'_, InMemoryWorkflowState>> {
        self.state.read().map_err(|err| {
            WorkflowRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> WorkflowRepositoryResult<RwLockWriteGuard<'_, InMemoryWorkflowState>> {
        self.state.write().map_err(|err| {
            WorkflowRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn task_mutex(&self, id: WorkflowTaskId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn create_if_idle(
        &self,
        task: &WorkflowTask,
        max_attempts: u32,
    ) -> WorkflowRepositoryResult<CreateOutcome> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(WorkflowRepositoryError::DuplicateTask(task.id()));
        }
        let policy = RetryPolicy::surfacing(max_attempts, 0);
        if let Some(existing) = state.in_progress_for(task.kind(), task.key(), &policy) {
            return Ok(CreateOutcome::InProgress(existing));
        }

        state
            .key_index
            .entry((task.kind(), task.key().clone()))
            .or_default()
            .push(task.id());
        state.tasks.insert(task.id(), task.clone());
        Ok(CreateOutcome::Created(task.id()))
    }

    async fn find_task(
        &self,
        id: WorkflowTaskId,
    ) -> WorkflowRepositoryResult<Option<WorkflowTask>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn tasks_for_key(
        &self,
        kind: WorkflowKind,
        key: &WorkflowKey,
    ) -> WorkflowRepositoryResult<Vec<WorkflowTask>> {
        let state = self.read()?;
        Ok(state
            .key_index
            .get(&(kind, key.clone()))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.tasks.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_attempt(&self, attempt: &Attempt) -> WorkflowRepositoryResult<()> {
        let mut state = self.write()?;
        if !state.tasks.contains_key(&attempt.workflow_task_id) {
            return Err(WorkflowRepositoryError::TaskNotFound(
                attempt.workflow_task_id,
            ));
        }
        state
            .attempt_owner
            .insert(attempt.id, attempt.workflow_task_id);
        state
            .attempts
            .entry(attempt.workflow_task_id)
            .or_default()
            .push(attempt.clone());
        Ok(())
    }

    async fn attempt_history(
        &self,
        task_id: WorkflowTaskId,
    ) -> WorkflowRepositoryResult<Vec<AttemptRecord>> {
        let state = self.read()?;
        Ok(state.history(task_id))
    }

    async fn find_attempt(&self, id: AttemptId) -> WorkflowRepositoryResult<Option<Attempt>> {
        let state = self.read()?;
        let attempt = state
            .attempt_owner
            .get(&id)
            .and_then(|task_id| state.attempts.get(task_id))
            .and_then(|attempts| attempts.iter().find(|attempt| attempt.id == id))
            .cloned();
        Ok(attempt)
    }

    async fn record_outcome(
        &self,
        outcome: &AttemptOutcome,
    ) -> WorkflowRepositoryResult<FactInsert> {
        let mut state = self.write()?;
        let attempt_id = outcome.attempt_id();
        if !state.attempt_owner.contains_key(&attempt_id) {
            return Err(WorkflowRepositoryError::AttemptNotFound(attempt_id));
        }
        if let Some(existing) = state.outcomes.get(&attempt_id) {
            if existing.is_success() == outcome.is_success() {
                return Ok(FactInsert::AlreadyRecorded);
            }
            return Ok(FactInsert::Contradicted(existing.clone()));
        }
        state.outcomes.insert(attempt_id, outcome.clone());
        Ok(FactInsert::Recorded)
    }

    async fn lock(&self, id: WorkflowTaskId) -> WorkflowRepositoryResult<WorkflowLock> {
        let mutex = self.task_mutex(id);
        let guard = mutex.lock_owned().await;
        Ok(WorkflowLock::new(TaskLockGuard {
            guard: Some(guard),
            id,
            locks: Arc::clone(&self.locks),
        }))
    }
}

type LockTable = Arc<Mutex<HashMap<WorkflowTaskId, Arc<tokio::sync::Mutex<()>>>>>;

/// Releases a task mutex and forgets it once nobody else waits on it.
struct TaskLockGuard {
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
    id: WorkflowTaskId,
    locks: LockTable,
}

impl Drop for TaskLockGuard {
    fn drop(&mut self) {
        // Waiters clone the mutex under the table lock, so the count is exact here.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());
        let unshared = locks
            .get(&self.id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
        if unshared {
            locks.remove(&self.id);
        }
    }
}
