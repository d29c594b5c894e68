//! Ingestion of provider transcription callbacks.
//!
//! Callbacks are stored unverified. The endpoint always acknowledges so
//! the provider's retry behaviour never leaks into visible errors; the
//! receipt only tells the caller what happened for logging.

use crate::clock::SharedClock;
use crate::workflows::{
    domain::{TranscriptionResponse, callback_request_id},
    ports::{TranscriptionRepository, TranscriptionRepositoryResult},
};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What became of a received callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookReceipt {
    /// The callback was stored against its attempt.
    Stored,
    /// A callback for the attempt was already stored.
    Duplicate,
    /// No recorded request carries the callback's correlation id.
    Unmatched,
    /// The body carries no correlation id.
    Malformed,
}

/// Receives transcription callbacks.
#[derive(Clone)]
pub struct TranscriptionWebhook {
    repository: Arc<dyn TranscriptionRepository>,
    clock: SharedClock,
}

impl TranscriptionWebhook {
    /// Creates the receiver.
    #[must_use]
    pub const fn new(repository: Arc<dyn TranscriptionRepository>, clock: SharedClock) -> Self {
        Self { repository, clock }
    }

    /// Correlates a raw callback with its request and stores it.
    ///
    /// # Errors
    ///
    /// Returns a persistence error only; every other outcome is a receipt.
    pub async fn receive(
        &self,
        raw_body: &str,
        signature: &str,
    ) -> TranscriptionRepositoryResult<WebhookReceipt> {
        let provider_request_id = match callback_request_id(raw_body) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "transcription callback ignored");
                return Ok(WebhookReceipt::Malformed);
            }
        };
        let Some(request) = self
            .repository
            .request_by_provider_id(&provider_request_id)
            .await?
        else {
            tracing::warn!(
                provider_request_id = %provider_request_id,
                "transcription callback matches no request"
            );
            return Ok(WebhookReceipt::Unmatched);
        };
        let response = TranscriptionResponse {
            attempt_id: request.attempt_id,
            provider_request_id,
            raw_body: raw_body.to_owned(),
            signature: signature.to_owned(),
            received_at: self.clock.utc(),
        };
        if self.repository.record_response(&response).await? {
            tracing::info!(
                attempt_id = %response.attempt_id,
                provider_request_id = %response.provider_request_id,
                "transcription callback stored"
            );
            Ok(WebhookReceipt::Stored)
        } else {
            tracing::debug!(
                attempt_id = %response.attempt_id,
                "duplicate transcription callback"
            );
            Ok(WebhookReceipt::Duplicate)
        }
    }
}
