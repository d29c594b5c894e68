//! `PostgreSQL` transcription repository implementation.

use super::{
    models::{TranscriptionRequestRow, TranscriptionResponseRow},
    schema::{transcription_requests, transcription_responses},
};
use crate::supervisor::domain::AttemptId;
use crate::workflows::{
    domain::{RecordingId, TranscriptionRequest, TranscriptionResponse},
    ports::{TranscriptionRepository, TranscriptionRepositoryError, TranscriptionRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by the transcription repository.
pub type TranscriptionPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed transcription repository.
#[derive(Debug, Clone)]
pub struct PostgresTranscriptionRepository {
    pool: TranscriptionPgPool,
}

impl PostgresTranscriptionRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TranscriptionPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TranscriptionRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TranscriptionRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TranscriptionRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TranscriptionRepositoryError::persistence)?
    }
}

#[async_trait]
impl TranscriptionRepository for PostgresTranscriptionRepository {
    async fn record_request(
        &self,
        request: &TranscriptionRequest,
    ) -> TranscriptionRepositoryResult<bool> {
        let row = TranscriptionRequestRow {
            attempt_id: request.attempt_id.into_inner(),
            recording_id: request.recording_id.into_inner(),
            provider_request_id: request.provider_request_id.clone(),
            created_at: request.created_at,
        };
        self.run_blocking(move |connection| {
            let provider_request_id = row.provider_request_id.clone();
            diesel::insert_into(transcription_requests::table)
                .values(&row)
                .on_conflict(transcription_requests::attempt_id)
                .do_nothing()
                .execute(connection)
                .map(|inserted| inserted > 0)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TranscriptionRepositoryError::DuplicateProviderRequest(provider_request_id)
                    }
                    _ => TranscriptionRepositoryError::persistence(err),
                })
        })
        .await
    }

    async fn request_for_attempt(
        &self,
        attempt_id: AttemptId,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionRequest>> {
        self.run_blocking(move |connection| {
            transcription_requests::table
                .find(attempt_id.into_inner())
                .select(TranscriptionRequestRow::as_select())
                .first::<TranscriptionRequestRow>(connection)
                .optional()
                .map(|row| row.map(row_to_request))
                .map_err(TranscriptionRepositoryError::persistence)
        })
        .await
    }

    async fn request_by_provider_id(
        &self,
        provider_request_id: &str,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionRequest>> {
        let lookup = provider_request_id.to_owned();
        self.run_blocking(move |connection| {
            transcription_requests::table
                .filter(transcription_requests::provider_request_id.eq(lookup))
                .select(TranscriptionRequestRow::as_select())
                .first::<TranscriptionRequestRow>(connection)
                .optional()
                .map(|row| row.map(row_to_request))
                .map_err(TranscriptionRepositoryError::persistence)
        })
        .await
    }

    async fn record_response(
        &self,
        response: &TranscriptionResponse,
    ) -> TranscriptionRepositoryResult<bool> {
        let row = TranscriptionResponseRow {
            attempt_id: response.attempt_id.into_inner(),
            provider_request_id: response.provider_request_id.clone(),
            raw_body: response.raw_body.clone(),
            signature: response.signature.clone(),
            received_at: response.received_at,
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(transcription_responses::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(connection)
                .map(|inserted| inserted > 0)
                .map_err(TranscriptionRepositoryError::persistence)
        })
        .await
    }

    async fn response_for_attempt(
        &self,
        attempt_id: AttemptId,
    ) -> TranscriptionRepositoryResult<Option<TranscriptionResponse>> {
        self.run_blocking(move |connection| {
            transcription_responses::table
                .find(attempt_id.into_inner())
                .select(TranscriptionResponseRow::as_select())
                .first::<TranscriptionResponseRow>(connection)
                .optional()
                .map(|row| row.map(row_to_response))
                .map_err(TranscriptionRepositoryError::persistence)
        })
        .await
    }
}

fn row_to_request(row: TranscriptionRequestRow) -> TranscriptionRequest {
    TranscriptionRequest {
        attempt_id: AttemptId::from_uuid(row.attempt_id),
        recording_id: RecordingId::from_uuid(row.recording_id),
        provider_request_id: row.provider_request_id,
        created_at: row.created_at,
    }
}

fn row_to_response(row: TranscriptionResponseRow) -> TranscriptionResponse {
    TranscriptionResponse {
        attempt_id: AttemptId::from_uuid(row.attempt_id),
        provider_request_id: row.provider_request_id,
        raw_body: row.raw_body,
        signature: row.signature,
        received_at: row.received_at,
    }
}
