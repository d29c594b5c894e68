//! Records of the two-stage transcription protocol.
//!
//! Stage one stores a [`TranscriptionRequest`] once the provider accepts an
//! outbound call and assigns a correlation id. Stage two stores the signed
//! callback as a [`TranscriptionResponse`], unverified. Verification happens
//! when the supervisor next polls the attempt.

use super::RecordingId;
use crate::supervisor::domain::AttemptId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outbound request accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    /// Attempt the request belongs to.
    pub attempt_id: AttemptId,
    /// Recording being transcribed.
    pub recording_id: RecordingId,
    /// Correlation id assigned by the provider.
    pub provider_request_id: String,
    /// When the provider accepted the request.
    pub created_at: DateTime<Utc>,
}

/// Callback received from the provider, stored exactly as delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    /// Attempt the callback was correlated to.
    pub attempt_id: AttemptId,
    /// Correlation id carried by the callback.
    pub provider_request_id: String,
    /// Raw request body.
    pub raw_body: String,
    /// Raw signature header.
    pub signature: String,
    /// When the callback arrived.
    pub received_at: DateTime<Utc>,
}

/// Transcript extracted from a verified callback body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTranscript {
    /// Correlation id carried by the callback.
    pub request_id: String,
    /// Transcript text.
    pub text: String,
}

/// Errors raised while reading a callback body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackBodyError {
    /// The body is not JSON.
    #[error("callback body is not JSON: {0}")]
    NotJson(String),
    /// A required field is absent or not a string.
    #[error("callback body lacks {0}")]
    MissingField(&'static str),
}

/// Extracts the correlation id from a callback body.
///
/// # Errors
///
/// Returns [`CallbackBodyError`] when the body is not JSON or lacks
/// `data.request_id`.
pub fn callback_request_id(raw_body: &str) -> Result<String, CallbackBodyError> {
    let document = parse_body(raw_body)?;
    string_at(&document, "/data/request_id", "data.request_id")
}

/// Extracts the correlation id and transcript from a callback body.
///
/// # Errors
///
/// Returns [`CallbackBodyError`] when the body is not JSON or lacks
/// `data.request_id` or `data.transcription.text`.
pub fn parse_transcript(raw_body: &str) -> Result<ProviderTranscript, CallbackBodyError> {
    let document = parse_body(raw_body)?;
    Ok(ProviderTranscript {
        request_id: string_at(&document, "/data/request_id", "data.request_id")?,
        text: string_at(
            &document,
            "/data/transcription/text",
            "data.transcription.text",
        )?,
    })
}

fn parse_body(raw_body: &str) -> Result<Value, CallbackBodyError> {
    serde_json::from_str(raw_body).map_err(|err| CallbackBodyError::NotJson(err.to_string()))
}

fn string_at(
    document: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<String, CallbackBodyError> {
    document
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(CallbackBodyError::MissingField(field))
}
