//! In-memory task store for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::queue::{
    domain::{Completion, Lease, QueueErrorRecord, QueueTask, QueueTaskId, is_available},
    ports::{QueueStoreError, QueueStoreResult, TaskStore},
};

/// Thread-safe in-memory task store.
///
/// Claims run under the write lock, so concurrent claimants are serialized
/// and never observe the same available task.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<InMemoryQueueState>>,
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    tasks: HashMap<QueueTaskId, QueueTask>,
    leases: HashMap<QueueTaskId, Vec<Lease>>,
    completions: HashMap<QueueTaskId, Completion>,
    errors: Vec<QueueErrorRecord>,
}

impl InMemoryQueueState {
    fn is_available(&self, task: &QueueTask, now: DateTime<Utc>) -> bool {
        let leases = self
            .leases
            .get(&task.id())
            .map_or(&[][..], Vec::as_slice);
        let completed = self.completions.contains_key(&task.id());
        is_available(task, leases, completed, now)
    }
}

impl InMemoryTaskStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored task, ordered by `(scheduled_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueStoreError::Persistence`] if the lock is poisoned.
    pub fn snapshot(&self) -> QueueStoreResult<Vec<QueueTask>> {
        let state = self.read()?;
        let mut tasks: Vec<QueueTask> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|task| (task.scheduled_at(), task.id()));
        Ok(tasks)
    }

    fn read(&self) -> QueueStoreResult<RwLockReadGuard<'_, InMemoryQueueState>> {
        self.state.read().map_err(|err| {
            QueueStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> QueueStoreResult<RwLockWriteGuard<'_, InMemoryQueueState>> {
        self.state.write().map_err(|err| {
            QueueStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: &QueueTask) -> QueueStoreResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(QueueStoreError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn claim_next_available(
        &self,
        now: DateTime<Utc>,
        lease_duration: Duration,
    ) -> QueueStoreResult<Option<(QueueTask, Lease)>> {
        let mut state = self.write()?;
        let next = state
            .tasks
            .values()
            .filter(|task| state.is_available(task, now))
            .min_by_key(|task| (task.scheduled_at(), task.id()))
            .cloned();
        let Some(task) = next else {
            return Ok(None);
        };

        let lease = Lease::grant(task.id(), now, lease_duration);
        state
            .leases
            .entry(task.id())
            .or_default()
            .push(lease.clone());
        Ok(Some((task, lease)))
    }

    async fn insert_completion(
        &self,
        task_id: QueueTaskId,
        completed_at: DateTime<Utc>,
    ) -> QueueStoreResult<bool> {
        let mut state = self.write()?;
        if !state.tasks.contains_key(&task_id) {
            return Err(QueueStoreError::NotFound(task_id));
        }
        if state.completions.contains_key(&task_id) {
            return Ok(false);
        }
        state.completions.insert(
            task_id,
            Completion {
                task_id,
                completed_at,
            },
        );
        Ok(true)
    }

    async fn insert_error(&self, record: &QueueErrorRecord) -> QueueStoreResult<()> {
        let mut state = self.write()?;
        state.errors.push(record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: QueueTaskId) -> QueueStoreResult<Option<QueueTask>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn leases_for(&self, id: QueueTaskId) -> QueueStoreResult<Vec<Lease>> {
        let state = self.read()?;
        Ok(state.leases.get(&id).cloned().unwrap_or_default())
    }

    async fn errors_for(&self, id: QueueTaskId) -> QueueStoreResult<Vec<QueueErrorRecord>> {
        let state = self.read()?;
        Ok(state
            .errors
            .iter()
            .filter(|record| record.task_id == Some(id))
            .cloned()
            .collect())
    }

    async fn is_completed(&self, id: QueueTaskId) -> QueueStoreResult<bool> {
        let state = self.read()?;
        Ok(state.completions.contains_key(&id))
    }
}
