//! Queued task records and the closed set of task kinds.

use super::{ParseTaskKindError, QueueDomainError, QueueTaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kinds of work a worker knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Invoke a registered function inside the engine.
    DbFunction,
    /// Send an email through the mail provider.
    Email,
    /// Send a text message through the SMS provider.
    Sms,
    /// Delete an object from cloud storage.
    FileDelete,
    /// Submit a recording to the transcription provider.
    TranscriptionKickoff,
}

impl TaskKind {
    /// Every task kind, in storage order.
    pub const ALL: [Self; 5] = [
        Self::DbFunction,
        Self::Email,
        Self::Sms,
        Self::FileDelete,
        Self::TranscriptionKickoff,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DbFunction => "db_function",
            Self::Email => "email",
            Self::Sms => "sms",
            Self::FileDelete => "file_delete",
            Self::TranscriptionKickoff => "transcription_kickoff",
        }
    }

    /// Returns whether the worker must talk to an external provider.
    ///
    /// Provider tasks carry before/success/error handler names in their
    /// payload; `db_function` tasks carry a single function call.
    #[must_use]
    pub const fn requires_provider(self) -> bool {
        !matches!(self, Self::DbFunction)
    }
}

impl TryFrom<&str> for TaskKind {
    type Error = ParseTaskKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseTaskKindError(value.to_owned()))
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatchable unit of queued work. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTask {
    id: QueueTaskId,
    kind: TaskKind,
    payload: Value,
    enqueued_at: DateTime<Utc>,
    scheduled_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted queue task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedQueueTask {
    /// Persisted task identifier.
    pub id: QueueTaskId,
    /// Persisted task kind.
    pub kind: TaskKind,
    /// Persisted payload document.
    pub payload: Value,
    /// Persisted enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
    /// Persisted earliest dispatch time.
    pub scheduled_at: DateTime<Utc>,
}

impl QueueTask {
    /// Creates a new task scheduled for `scheduled_at`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::PayloadNotObject`] when `payload` is not a
    /// JSON object.
    pub fn new(
        kind: TaskKind,
        payload: Value,
        scheduled_at: DateTime<Utc>,
        clock: &(impl Clock + ?Sized),
    ) -> Result<Self, QueueDomainError> {
        if !payload.is_object() {
            return Err(QueueDomainError::PayloadNotObject(json_type_name(&payload)));
        }
        Ok(Self {
            id: QueueTaskId::new(),
            kind,
            payload,
            enqueued_at: clock.utc(),
            scheduled_at,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedQueueTask) -> Self {
        Self {
            id: data.id,
            kind: data.kind,
            payload: data.payload,
            enqueued_at: data.enqueued_at,
            scheduled_at: data.scheduled_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> QueueTaskId {
        self.id
    }

    /// Returns the task kind.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Returns the payload document.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns when the task was enqueued.
    #[must_use]
    pub const fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Returns the earliest time the task may be dispatched.
    #[must_use]
    pub const fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// Returns whether the task is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
