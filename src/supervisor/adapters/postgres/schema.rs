//! Diesel schema for supervised workflows.

diesel::table! {
    /// Root records managed by supervisors.
    workflow_tasks (id) {
        /// Workflow task identifier.
        id -> Uuid,
        /// Workflow kind.
        #[max_length = 50]
        kind -> Varchar,
        /// Domain key.
        #[max_length = 255]
        workflow_key -> Varchar,
        /// Kickoff input document.
        input -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Holder of the supervisor lock, if any.
        lock_token -> Nullable<Uuid>,
        /// When the supervisor lock lapses.
        locked_until -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Append-only attempt log.
    workflow_attempts (id) {
        /// Attempt identifier.
        id -> Uuid,
        /// Owning workflow task.
        workflow_task_id -> Uuid,
        /// One-based attempt number.
        attempt_number -> Int4,
        /// Attempt start timestamp.
        started_at -> Timestamptz,
    }
}

diesel::table! {
    /// Outcome facts, one per attempt.
    attempt_outcomes (attempt_id) {
        /// Attempt the fact belongs to.
        attempt_id -> Uuid,
        /// `succeeded` or `failed`.
        #[max_length = 20]
        outcome -> Varchar,
        /// Success detail document.
        detail -> Nullable<Jsonb>,
        /// Failure reason.
        reason -> Nullable<Text>,
        /// Record timestamp.
        recorded_at -> Timestamptz,
    }
}

diesel::joinable!(workflow_attempts -> workflow_tasks (workflow_task_id));
diesel::joinable!(attempt_outcomes -> workflow_attempts (attempt_id));
diesel::allow_tables_to_appear_in_same_query!(workflow_tasks, workflow_attempts, attempt_outcomes);
