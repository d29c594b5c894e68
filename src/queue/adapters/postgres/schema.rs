//! Diesel schema for the task store.

diesel::table! {
    /// Dispatchable work items.
    queue_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Task kind.
        #[max_length = 50]
        kind -> Varchar,
        /// Payload document.
        payload -> Jsonb,
        /// Enqueue timestamp.
        enqueued_at -> Timestamptz,
        /// Earliest dispatch time.
        scheduled_at -> Timestamptz,
        /// Expiry of the newest lease, mirrored from `queue_leases`.
        leased_until -> Nullable<Timestamptz>,
        /// Mirrors the presence of a `queue_completions` row.
        completed -> Bool,
    }
}

diesel::table! {
    /// Append-only claims on tasks.
    queue_leases (id) {
        /// Lease identifier.
        id -> Uuid,
        /// Claimed task.
        task_id -> Uuid,
        /// Claim timestamp.
        leased_at -> Timestamptz,
        /// Claim expiry.
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    /// Completion facts, at most one per task.
    queue_completions (task_id) {
        /// Completed task.
        task_id -> Uuid,
        /// Completion timestamp.
        completed_at -> Timestamptz,
    }
}

diesel::table! {
    /// Worker failure records kept for observability.
    queue_errors (id) {
        /// Error identifier.
        id -> Uuid,
        /// Related task, when known.
        task_id -> Nullable<Uuid>,
        /// Failure message.
        message -> Text,
        /// Record timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(queue_leases -> queue_tasks (task_id));
diesel::joinable!(queue_completions -> queue_tasks (task_id));
diesel::allow_tables_to_appear_in_same_query!(
    queue_tasks,
    queue_leases,
    queue_completions,
    queue_errors,
);
