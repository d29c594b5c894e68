//! Diesel row models for the task store.

use super::schema::{queue_completions, queue_errors, queue_leases, queue_tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for queued tasks.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Insertable)]
#[diesel(table_name = queue_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QueueTaskRow {
    /// Task identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Task kind.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub kind: String,
    /// Payload document.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub payload: Value,
    /// Enqueue timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub enqueued_at: DateTime<Utc>,
    /// Earliest dispatch time.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub scheduled_at: DateTime<Utc>,
}

/// Row model for leases.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = queue_leases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LeaseRow {
    /// Lease identifier.
    pub id: uuid::Uuid,
    /// Claimed task.
    pub task_id: uuid::Uuid,
    /// Claim timestamp.
    pub leased_at: DateTime<Utc>,
    /// Claim expiry.
    pub expires_at: DateTime<Utc>,
}

/// Insert model for completion facts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = queue_completions)]
pub struct NewCompletionRow {
    /// Completed task.
    pub task_id: uuid::Uuid,
    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
}

/// Row model for error records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = queue_errors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QueueErrorRow {
    /// Error identifier.
    pub id: uuid::Uuid,
    /// Related task, when known.
    pub task_id: Option<uuid::Uuid>,
    /// Failure message.
    pub message: String,
    /// Record timestamp.
    pub created_at: DateTime<Utc>,
}
