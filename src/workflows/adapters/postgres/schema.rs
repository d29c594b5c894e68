//! Diesel schema for transcription records.

diesel::table! {
    /// Outbound requests accepted by the provider.
    transcription_requests (attempt_id) {
        /// Attempt the request belongs to.
        attempt_id -> Uuid,
        /// Recording being transcribed.
        recording_id -> Uuid,
        /// Provider correlation id.
        #[max_length = 255]
        provider_request_id -> Varchar,
        /// Acceptance timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Unverified provider callbacks.
    transcription_responses (attempt_id) {
        /// Attempt the callback was correlated to.
        attempt_id -> Uuid,
        /// Provider correlation id.
        #[max_length = 255]
        provider_request_id -> Varchar,
        /// Raw request body.
        raw_body -> Text,
        /// Raw signature header.
        signature -> Text,
        /// Receipt timestamp.
        received_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(transcription_requests, transcription_responses);
