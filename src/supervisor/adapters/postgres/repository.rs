//! `PostgreSQL` workflow repository implementation.

use super::{
    lock::{Acquisition, FIRST_POLL, MAX_POLL, RowLeaseGuard, try_acquire},
    models::{AttemptOutcomeRow, AttemptRow, IdRow, WorkflowTaskRow},
    schema::{attempt_outcomes, workflow_attempts, workflow_tasks},
};
use crate::supervisor::{
    domain::{
        Attempt, AttemptId, AttemptOutcome, AttemptRecord, FactInsert, PersistedWorkflowTask,
        WorkflowKey, WorkflowKind, WorkflowTask, WorkflowTaskId,
    },
    ports::{
        CreateOutcome, WorkflowLock, WorkflowRepository, WorkflowRepositoryError,
        WorkflowRepositoryResult,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;
use uuid::Uuid;

/// `PostgreSQL` connection pool type used by the workflow repository.
pub type WorkflowPgPool = Pool<ConnectionManager<PgConnection>>;

/// Serializes creation per kind and key for the rest of the transaction.
const KEY_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))";

/// Finds the newest task for a kind and key with no success fact and fewer
/// than `$3` failure facts.
const IN_PROGRESS_SQL: &str = concat!(
    "SELECT t.id FROM workflow_tasks t ",
    "WHERE t.kind = $1 AND t.workflow_key = $2 ",
    "AND NOT EXISTS (",
    "SELECT 1 FROM workflow_attempts a JOIN attempt_outcomes o ON o.attempt_id = a.id ",
    "WHERE a.workflow_task_id = t.id AND o.outcome = 'succeeded'",
    ") ",
    "AND (",
    "SELECT COUNT(*) FROM workflow_attempts a JOIN attempt_outcomes o ON o.attempt_id = a.id ",
    "WHERE a.workflow_task_id = t.id AND o.outcome = 'failed'",
    ") < $3 ",
    "ORDER BY t.created_at DESC, t.id DESC ",
    "LIMIT 1",
);

/// `PostgreSQL`-backed workflow repository.
#[derive(Debug, Clone)]
pub struct PostgresWorkflowRepository {
    pool: WorkflowPgPool,
}

impl PostgresWorkflowRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: WorkflowPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> WorkflowRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> WorkflowRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(WorkflowRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(WorkflowRepositoryError::persistence)?
    }
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn create_if_idle(
        &self,
        task: &WorkflowTask,
        max_attempts: u32,
    ) -> WorkflowRepositoryResult<CreateOutcome> {
        let task_id = task.id();
        let row = to_task_row(task);
        self.run_blocking(move |connection| {
            connection
                .transaction::<_, DieselError, _>(|conn| {
                    let lock_key = format!("{}:{}", row.kind, row.workflow_key);
                    diesel::sql_query(KEY_LOCK_SQL)
                        .bind::<diesel::sql_types::Text, _>(lock_key)
                        .execute(conn)?;
                    let existing = diesel::sql_query(IN_PROGRESS_SQL)
                        .bind::<diesel::sql_types::Text, _>(row.kind.clone())
                        .bind::<diesel::sql_types::Text, _>(row.workflow_key.clone())
                        .bind::<diesel::sql_types::BigInt, _>(i64::from(max_attempts))
                        .get_result::<IdRow>(conn)
                        .optional()?;
                    if let Some(found) = existing {
                        return Ok(CreateOutcome::InProgress(WorkflowTaskId::from_uuid(
                            found.id,
                        )));
                    }
                    diesel::insert_into(workflow_tasks::table)
                        .values(&row)
                        .execute(conn)?;
                    Ok(CreateOutcome::Created(task_id))
                })
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        WorkflowRepositoryError::DuplicateTask(task_id)
                    }
                    _ => WorkflowRepositoryError::persistence(err),
                })
        })
        .await
    }

    async fn find_task(
        &self,
        id: WorkflowTaskId,
    ) -> WorkflowRepositoryResult<Option<WorkflowTask>> {
        self.run_blocking(move |connection| {
            let row = workflow_tasks::table
                .filter(workflow_tasks::id.eq(id.into_inner()))
                .select(WorkflowTaskRow::as_select())
                .first::<WorkflowTaskRow>(connection)
                .optional()
                .map_err(WorkflowRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn tasks_for_key(
        &self,
        kind: WorkflowKind,
        key: &WorkflowKey,
    ) -> WorkflowRepositoryResult<Vec<WorkflowTask>> {
        let key_value = key.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = workflow_tasks::table
                .filter(workflow_tasks::kind.eq(kind.as_str()))
                .filter(workflow_tasks::workflow_key.eq(key_value))
                .order((workflow_tasks::created_at.asc(), workflow_tasks::id.asc()))
                .select(WorkflowTaskRow::as_select())
                .load::<WorkflowTaskRow>(connection)
                .map_err(WorkflowRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn append_attempt(&self, attempt: &Attempt) -> WorkflowRepositoryResult<()> {
        let task_id = attempt.workflow_task_id;
        let row = to_attempt_row(attempt)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(workflow_attempts::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        WorkflowRepositoryError::TaskNotFound(task_id)
                    }
                    _ => WorkflowRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn attempt_history(
        &self,
        task_id: WorkflowTaskId,
    ) -> WorkflowRepositoryResult<Vec<AttemptRecord>> {
        self.run_blocking(move |connection| {
            let attempts = workflow_attempts::table
                .filter(workflow_attempts::workflow_task_id.eq(task_id.into_inner()))
                .order(workflow_attempts::attempt_number.asc())
                .select(AttemptRow::as_select())
                .load::<AttemptRow>(connection)
                .map_err(WorkflowRepositoryError::persistence)?;
            let attempt_ids: Vec<uuid::Uuid> = attempts.iter().map(|row| row.id).collect();
            let mut outcomes: HashMap<uuid::Uuid, AttemptOutcomeRow> = attempt_outcomes::table
                .filter(attempt_outcomes::attempt_id.eq_any(attempt_ids))
                .select(AttemptOutcomeRow::as_select())
                .load::<AttemptOutcomeRow>(connection)
                .map_err(WorkflowRepositoryError::persistence)?
                .into_iter()
                .map(|row| (row.attempt_id, row))
                .collect();
            attempts
                .into_iter()
                .map(|row| {
                    let outcome = outcomes.remove(&row.id).map(row_to_outcome).transpose()?;
                    Ok(AttemptRecord {
                        attempt: row_to_attempt(row)?,
                        outcome,
                    })
                })
                .collect()
        })
        .await
    }

    async fn find_attempt(&self, id: AttemptId) -> WorkflowRepositoryResult<Option<Attempt>> {
        self.run_blocking(move |connection| {
            let row = workflow_attempts::table
                .filter(workflow_attempts::id.eq(id.into_inner()))
                .select(AttemptRow::as_select())
                .first::<AttemptRow>(connection)
                .optional()
                .map_err(WorkflowRepositoryError::persistence)?;
            row.map(row_to_attempt).transpose()
        })
        .await
    }

    async fn record_outcome(
        &self,
        outcome: &AttemptOutcome,
    ) -> WorkflowRepositoryResult<FactInsert> {
        let attempt_id = outcome.attempt_id();
        let row = to_outcome_row(outcome);
        let is_success = outcome.is_success();
        self.run_blocking(move |connection| {
            let inserted = diesel::insert_into(attempt_outcomes::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        WorkflowRepositoryError::AttemptNotFound(attempt_id)
                    }
                    _ => WorkflowRepositoryError::persistence(err),
                })?;
            if inserted > 0 {
                return Ok(FactInsert::Recorded);
            }
            let stored = attempt_outcomes::table
                .filter(attempt_outcomes::attempt_id.eq(attempt_id.into_inner()))
                .select(AttemptOutcomeRow::as_select())
                .first::<AttemptOutcomeRow>(connection)
                .map_err(WorkflowRepositoryError::persistence)?;
            let existing = row_to_outcome(stored)?;
            if existing.is_success() == is_success {
                Ok(FactInsert::AlreadyRecorded)
            } else {
                Ok(FactInsert::Contradicted(existing))
            }
        })
        .await
    }

    async fn lock(&self, id: WorkflowTaskId) -> WorkflowRepositoryResult<WorkflowLock> {
        let token = Uuid::new_v4();
        let mut wait = FIRST_POLL;
        loop {
            let attempt = self
                .run_blocking(move |connection| {
                    try_acquire(connection, id.into_inner(), token)
                        .map_err(WorkflowRepositoryError::persistence)
                })
                .await?;
            match attempt {
                Acquisition::Held => {
                    return Ok(WorkflowLock::new(RowLeaseGuard::new(
                        self.pool.clone(),
                        id.into_inner(),
                        token,
                    )));
                }
                Acquisition::NoSuchTask => return Ok(WorkflowLock::new(())),
                Acquisition::Busy => {
                    tokio::time::sleep(wait).await;
                    wait = (wait * 2).min(MAX_POLL);
                }
            }
        }
    }
}

fn to_task_row(task: &WorkflowTask) -> WorkflowTaskRow {
    WorkflowTaskRow {
        id: task.id().into_inner(),
        kind: task.kind().as_str().to_owned(),
        workflow_key: task.key().as_str().to_owned(),
        input: task.input().clone(),
        created_at: task.created_at(),
    }
}

fn row_to_task(row: WorkflowTaskRow) -> WorkflowRepositoryResult<WorkflowTask> {
    let kind =
        WorkflowKind::try_from(row.kind.as_str()).map_err(WorkflowRepositoryError::persistence)?;
    let key = WorkflowKey::new(row.workflow_key).map_err(WorkflowRepositoryError::persistence)?;
    Ok(WorkflowTask::from_persisted(PersistedWorkflowTask {
        id: WorkflowTaskId::from_uuid(row.id),
        kind,
        key,
        input: row.input,
        created_at: row.created_at,
    }))
}

fn to_attempt_row(attempt: &Attempt) -> WorkflowRepositoryResult<AttemptRow> {
    Ok(AttemptRow {
        id: attempt.id.into_inner(),
        workflow_task_id: attempt.workflow_task_id.into_inner(),
        attempt_number: i32::try_from(attempt.number)
            .map_err(WorkflowRepositoryError::persistence)?,
        started_at: attempt.started_at,
    })
}

fn row_to_attempt(row: AttemptRow) -> WorkflowRepositoryResult<Attempt> {
    Ok(Attempt {
        id: AttemptId::from_uuid(row.id),
        workflow_task_id: WorkflowTaskId::from_uuid(row.workflow_task_id),
        number: u32::try_from(row.attempt_number).map_err(WorkflowRepositoryError::persistence)?,
        started_at: row.started_at,
    })
}

fn to_outcome_row(outcome: &AttemptOutcome) -> AttemptOutcomeRow {
    let (detail, reason) = match outcome {
        AttemptOutcome::Succeeded { detail, .. } => (Some(detail.clone()), None),
        AttemptOutcome::Failed { reason, .. } => (None, Some(reason.clone())),
    };
    AttemptOutcomeRow {
        attempt_id: outcome.attempt_id().into_inner(),
        outcome: outcome.label().to_owned(),
        detail,
        reason,
        recorded_at: outcome.recorded_at(),
    }
}

fn row_to_outcome(row: AttemptOutcomeRow) -> WorkflowRepositoryResult<AttemptOutcome> {
    let attempt_id = AttemptId::from_uuid(row.attempt_id);
    match row.outcome.as_str() {
        "succeeded" => Ok(AttemptOutcome::Succeeded {
            attempt_id,
            detail: row.detail.unwrap_or(serde_json::Value::Null),
            recorded_at: row.recorded_at,
        }),
        "failed" => Ok(AttemptOutcome::Failed {
            attempt_id,
            reason: row.reason.unwrap_or_default(),
            recorded_at: row.recorded_at,
        }),
        other => Err(WorkflowRepositoryError::persistence(std::io::Error::other(
            format!("unknown attempt outcome: {other}"),
        ))),
    }
}
