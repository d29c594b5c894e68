//! Diesel row models for transcription records.

use super::schema::{transcription_requests, transcription_responses};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Row model for transcription requests.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = transcription_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TranscriptionRequestRow {
    /// Attempt the request belongs to.
    pub attempt_id: uuid::Uuid,
    /// Recording being transcribed.
    pub recording_id: uuid::Uuid,
    /// Provider correlation id.
    pub provider_request_id: String,
    /// Acceptance timestamp.
    pub created_at: DateTime<Utc>,
}

/// Row model for transcription responses.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = transcription_responses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TranscriptionResponseRow {
    /// Attempt the callback was correlated to.
    pub attempt_id: uuid::Uuid,
    /// Provider correlation id.
    pub provider_request_id: String,
    /// Raw request body.
    pub raw_body: String,
    /// Raw signature header.
    pub signature: String,
    /// Receipt timestamp.
    pub received_at: DateTime<Utc>,
}
