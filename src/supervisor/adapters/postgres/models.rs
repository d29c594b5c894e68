//! Diesel row models for supervised workflows.

use super::schema::{attempt_outcomes, workflow_attempts, workflow_tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Row model for workflow tasks.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = workflow_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkflowTaskRow {
    /// Workflow task identifier.
    pub id: uuid::Uuid,
    /// Workflow kind.
    pub kind: String,
    /// Domain key.
    pub workflow_key: String,
    /// Kickoff input document.
    pub input: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Row model for attempts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = workflow_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttemptRow {
    /// Attempt identifier.
    pub id: uuid::Uuid,
    /// Owning workflow task.
    pub workflow_task_id: uuid::Uuid,
    /// One-based attempt number.
    pub attempt_number: i32,
    /// Attempt start timestamp.
    pub started_at: DateTime<Utc>,
}

/// Row model for outcome facts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = attempt_outcomes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttemptOutcomeRow {
    /// Attempt the fact belongs to.
    pub attempt_id: uuid::Uuid,
    /// `succeeded` or `failed`.
    pub outcome: String,
    /// Success detail document.
    pub detail: Option<Value>,
    /// Failure reason.
    pub reason: Option<String>,
    /// Record timestamp.
    pub recorded_at: DateTime<Utc>,
}

/// Single-column identifier row for raw SQL lookups.
#[derive(Debug, Clone, QueryableByName)]
pub struct IdRow {
    /// Matched identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
}
