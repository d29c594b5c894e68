//! `PostgreSQL` task store implementation.

use super::{
    models::{LeaseRow, NewCompletionRow, QueueErrorRow, QueueTaskRow},
    schema::{queue_completions, queue_errors, queue_leases, queue_tasks},
};
use crate::queue::{
    domain::{
        Lease, LeaseId, PersistedQueueTask, QueueErrorId, QueueErrorRecord, QueueTask,
        QueueTaskId, TaskKind,
    },
    ports::{QueueStoreError, QueueStoreResult, TaskStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by the task store.
pub type QueuePgPool = Pool<ConnectionManager<PgConnection>>;

/// Claims the oldest available task by stamping its lease expiry.
///
/// Availability is re-checked on the locked row itself: a lease committed by
/// a concurrent claimant after this statement's snapshot is still seen, so a
/// task never carries two live leases.
const CLAIM_NEXT_SQL: &str = concat!(
    "UPDATE queue_tasks SET leased_until = $2 ",
    "WHERE id = (",
    "SELECT t.id FROM queue_tasks t ",
    "WHERE t.scheduled_at <= $1 ",
    "AND NOT t.completed ",
    "AND (t.leased_until IS NULL OR t.leased_until <= $1) ",
    "ORDER BY t.scheduled_at, t.id ",
    "LIMIT 1 ",
    "FOR UPDATE SKIP LOCKED",
    ") ",
    "AND NOT completed ",
    "AND (leased_until IS NULL OR leased_until <= $1) ",
    "RETURNING id, kind, payload, enqueued_at, scheduled_at",
);

/// `PostgreSQL`-backed task store.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: QueuePgPool,
}

impl PostgresTaskStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: QueuePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> QueueStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> QueueStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(QueueStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(QueueStoreError::persistence)?
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn insert(&self, task: &QueueTask) -> QueueStoreResult<()> {
        let task_id = task.id();
        let row = to_row(task);
        self.run_blocking(move |connection| {
            diesel::insert_into(queue_tasks::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        QueueStoreError::DuplicateTask(task_id)
                    }
                    _ => QueueStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn claim_next_available(
        &self,
        now: DateTime<Utc>,
        lease_duration: Duration,
    ) -> QueueStoreResult<Option<(QueueTask, Lease)>> {
        let claimed = self
            .run_blocking(move |connection| {
                connection
                    .transaction::<_, DieselError, _>(|conn| {
                        let expires_at = now + lease_duration;
                        let candidate = diesel::sql_query(CLAIM_NEXT_SQL)
                            .bind::<diesel::sql_types::Timestamptz, _>(now)
                            .bind::<diesel::sql_types::Timestamptz, _>(expires_at)
                            .get_result::<QueueTaskRow>(conn)
                            .optional()?;
                        let Some(row) = candidate else {
                            return Ok(None);
                        };
                        let lease =
                            Lease::grant(QueueTaskId::from_uuid(row.id), now, lease_duration);
                        let lease_row = LeaseRow {
                            id: lease.id.into_inner(),
                            task_id: row.id,
                            leased_at: lease.leased_at,
                            expires_at: lease.expires_at,
                        };
                        diesel::insert_into(queue_leases::table)
                            .values(&lease_row)
                            .execute(conn)?;
                        Ok(Some((row, lease)))
                    })
                    .map_err(QueueStoreError::persistence)
            })
            .await?;

        claimed
            .map(|(row, lease)| row_to_task(row).map(|task| (task, lease)))
            .transpose()
    }

    async fn insert_completion(
        &self,
        task_id: QueueTaskId,
        completed_at: DateTime<Utc>,
    ) -> QueueStoreResult<bool> {
        let row = NewCompletionRow {
            task_id: task_id.into_inner(),
            completed_at,
        };
        self.run_blocking(move |connection| {
            connection
                .transaction::<_, DieselError, _>(|conn| {
                    let inserted = diesel::insert_into(queue_completions::table)
                        .values(&row)
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                    diesel::update(queue_tasks::table.find(row.task_id))
                        .set(queue_tasks::completed.eq(true))
                        .execute(conn)?;
                    Ok(inserted > 0)
                })
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        QueueStoreError::NotFound(task_id)
                    }
                    _ => QueueStoreError::persistence(err),
                })
        })
        .await
    }

    async fn insert_error(&self, record: &QueueErrorRecord) -> QueueStoreResult<()> {
        let row = QueueErrorRow {
            id: record.id.into_inner(),
            task_id: record.task_id.map(QueueTaskId::into_inner),
            message: record.message.clone(),
            created_at: record.created_at,
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(queue_errors::table)
                .values(&row)
                .execute(connection)
                .map_err(QueueStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: QueueTaskId) -> QueueStoreResult<Option<QueueTask>> {
        self.run_blocking(move |connection| {
            let row = queue_tasks::table
                .filter(queue_tasks::id.eq(id.into_inner()))
                .select(QueueTaskRow::as_select())
                .first::<QueueTaskRow>(connection)
                .optional()
                .map_err(QueueStoreError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn leases_for(&self, id: QueueTaskId) -> QueueStoreResult<Vec<Lease>> {
        self.run_blocking(move |connection| {
            let rows = queue_leases::table
                .filter(queue_leases::task_id.eq(id.into_inner()))
                .order((queue_leases::leased_at.asc(), queue_leases::id.asc()))
                .select(LeaseRow::as_select())
                .load::<LeaseRow>(connection)
                .map_err(QueueStoreError::persistence)?;
            Ok(rows
                .into_iter()
                .map(|row| Lease {
                    id: LeaseId::from_uuid(row.id),
                    task_id: QueueTaskId::from_uuid(row.task_id),
                    leased_at: row.leased_at,
                    expires_at: row.expires_at,
                })
                .collect())
        })
        .await
    }

    async fn errors_for(&self, id: QueueTaskId) -> QueueStoreResult<Vec<QueueErrorRecord>> {
        self.run_blocking(move |connection| {
            let rows = queue_errors::table
                .filter(queue_errors::task_id.eq(id.into_inner()))
                .order((queue_errors::created_at.asc(), queue_errors::id.asc()))
                .select(QueueErrorRow::as_select())
                .load::<QueueErrorRow>(connection)
                .map_err(QueueStoreError::persistence)?;
            Ok(rows
                .into_iter()
                .map(|row| QueueErrorRecord {
                    id: QueueErrorId::from_uuid(row.id),
                    task_id: row.task_id.map(QueueTaskId::from_uuid),
                    message: row.message,
                    created_at: row.created_at,
                })
                .collect())
        })
        .await
    }

    async fn is_completed(&self, id: QueueTaskId) -> QueueStoreResult<bool> {
        self.run_blocking(move |connection| {
            diesel::select(diesel::dsl::exists(
                queue_completions::table.filter(queue_completions::task_id.eq(id.into_inner())),
            ))
            .get_result::<bool>(connection)
            .map_err(QueueStoreError::persistence)
        })
        .await
    }
}

fn to_row(task: &QueueTask) -> QueueTaskRow {
    QueueTaskRow {
        id: task.id().into_inner(),
        kind: task.kind().as_str().to_owned(),
        payload: task.payload().clone(),
        enqueued_at: task.enqueued_at(),
        scheduled_at: task.scheduled_at(),
    }
}

fn row_to_task(row: QueueTaskRow) -> QueueStoreResult<QueueTask> {
    let kind = TaskKind::try_from(row.kind.as_str()).map_err(QueueStoreError::persistence)?;
    Ok(QueueTask::from_persisted(PersistedQueueTask {
        id: QueueTaskId::from_uuid(row.id),
        kind,
        payload: row.payload,
        enqueued_at: row.enqueued_at,
        scheduled_at: row.scheduled_at,
    }))
}
