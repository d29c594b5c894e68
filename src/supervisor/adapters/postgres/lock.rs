//! Row-lease locks held for the span of one supervisor run.
//!
//! A lock is a token stamped on the `workflow_tasks` row with an expiry
//! taken from the database clock. Acquiring and releasing are single short
//! statements, so no pooled connection is held while the supervisor works
//! and no connection ever returns to the pool carrying lock state. A holder
//! that dies, or whose release fails, blocks others only until the expiry.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use std::time::Duration;
use uuid::Uuid;

type LockPool = Pool<ConnectionManager<PgConnection>>;

const ACQUIRE_SQL: &str = concat!(
    "UPDATE workflow_tasks ",
    "SET lock_token = $2, locked_until = clock_timestamp() + interval '60 seconds' ",
    "WHERE id = $1 AND (locked_until IS NULL OR locked_until <= clock_timestamp())",
);

const RELEASE_SQL: &str = concat!(
    "UPDATE workflow_tasks SET lock_token = NULL, locked_until = NULL ",
    "WHERE id = $1 AND lock_token = $2",
);

const EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM workflow_tasks WHERE id = $1) AS found";

/// First wait between acquisition attempts.
pub(super) const FIRST_POLL: Duration = Duration::from_millis(5);

/// Longest wait between acquisition attempts.
pub(super) const MAX_POLL: Duration = Duration::from_millis(250);

#[derive(QueryableByName)]
struct Found {
    #[diesel(sql_type = diesel::sql_types::Bool)]
    found: bool,
}

/// Result of one acquisition attempt.
pub(super) enum Acquisition {
    /// The caller now holds the lock.
    Held,
    /// Another holder's lease is live.
    Busy,
    /// There is no row to lock.
    NoSuchTask,
}

/// Tries once to stamp `token` on the task row.
pub(super) fn try_acquire(
    connection: &mut PgConnection,
    task_id: Uuid,
    token: Uuid,
) -> Result<Acquisition, diesel::result::Error> {
    let stamped = diesel::sql_query(ACQUIRE_SQL)
        .bind::<diesel::sql_types::Uuid, _>(task_id)
        .bind::<diesel::sql_types::Uuid, _>(token)
        .execute(connection)?;
    if stamped > 0 {
        return Ok(Acquisition::Held);
    }
    let exists = diesel::sql_query(EXISTS_SQL)
        .bind::<diesel::sql_types::Uuid, _>(task_id)
        .get_result::<Found>(connection)?;
    Ok(if exists.found {
        Acquisition::Busy
    } else {
        Acquisition::NoSuchTask
    })
}

/// Clears the lease stamped with `token` when dropped.
pub(super) struct RowLeaseGuard {
    pool: LockPool,
    task_id: Uuid,
    token: Uuid,
}

impl RowLeaseGuard {
    pub(super) const fn new(pool: LockPool, task_id: Uuid, token: Uuid) -> Self {
        Self {
            pool,
            task_id,
            token,
        }
    }
}

fn release(pool: &LockPool, task_id: Uuid, token: Uuid) {
    let result = pool
        .get()
        .map_err(|err| err.to_string())
        .and_then(|mut connection| {
            diesel::sql_query(RELEASE_SQL)
                .bind::<diesel::sql_types::Uuid, _>(task_id)
                .bind::<diesel::sql_types::Uuid, _>(token)
                .execute(&mut connection)
                .map_err(|err| err.to_string())
        });
    if let Err(err) = result {
        tracing::warn!(
            workflow_task_id = %task_id,
            error = %err,
            "failed to release workflow lock, it lapses after 60s"
        );
    }
}

impl Drop for RowLeaseGuard {
    fn drop(&mut self) {
        let pool = self.pool.clone();
        let (task_id, token) = (self.task_id, self.token);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn_blocking(move || release(&pool, task_id, token)));
            }
            Err(_) => release(&pool, task_id, token),
        }
    }
}
