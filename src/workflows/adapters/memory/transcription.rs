//! In-memory transcription repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::supervisor::domain::AttemptId;
use crate::workflows::{
    domain::{TranscriptionRequest, TranscriptionResponse},
    ports::{TranscriptionRepository, TranscriptionRepositoryError, TranscriptionRepositoryResult},
};

/// Thread-safe in-memory transcription repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTranscriptionRepository {
    state: Arc<RwLock<TranscriptionState>>,
}

#[derive(Debug, Default)]
struct TranscriptionState {
    requests: HashMap<AttemptId, TranscriptionRequest>,
    provider_index: HashMap<String, AttemptId>,
    responses: HashMap<AttemptId, TranscriptionResponse>,
}

impl InMemoryTranscriptionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TranscriptionRepositoryResult<RwLockReadGuard<'_, TranscriptionState>> {
        self.state.read().map_err(|err| {
            TranscriptionRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TranscriptionRepositoryResult<RwLockWriteGuard<'_, TranscriptionState>> {
        self.state.write().map_err(|err| {
            TranscriptionRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl TranscriptionRepository for InMemoryTranscriptionRepository {
    async fn record_request(
        &self,
        request: &TranscriptionRequest,
    ) -> TranscriptionRepositoryResult<bool> {
        let mut state = self.write()?;
        if state.requests.contains_key(&request.attempt_id) {
            return Ok(false);
        }
        if state
            .provider_index
            .get(&request.provider_request_id)
            .is_some_and(|owner| *owner != request.attempt_id)
        {
            return Err(TranscriptionRepositoryError::DuplicateProviderRequest(
                request.provider_request_id.clone(),
            ));
        }
        state
            .provider_index
            .insert(request.provider_request_id.clone(), request.attempt_id);
        state.requests.insert(request.attempt_id, request.clone());
        Ok(true)
    }

    async fn request_for_attempt(
        &self,
        attempt_id: AttemptId,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionRequest>> {
        Ok(self.read()?.requests.get(&attempt_id).cloned())
    }

    async fn request_by_provider_id(
        &self,
        provider_request_id: &str,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionRequest>> {
        let state = self.read()?;
        Ok(state
            .provider_index
            .get(provider_request_id)
            .and_then(|attempt_id| state.requests.get(attempt_id))
            .cloned())
    }

    async fn record_response(
        &self,
        response: &TranscriptionResponse,
    ) -> TranscriptionRepositoryResult<bool> {
        let mut state = self.write()?;
        if state.responses.contains_key(&response.attempt_id) {
            return Ok(false);
        }
        state.responses.insert(response.attempt_id, response.clone());
        Ok(true)
    }

    async fn response_for_attempt(
        &self,
        attempt_id: AttemptId,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionResponse>> {
        Ok(self.read()?.responses.get(&attempt_id).cloned())
    }
}
