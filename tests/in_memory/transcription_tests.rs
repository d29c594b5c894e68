//! In-memory integration tests for webhook-completed transcription.

use super::helpers::{Harness, config, harness, transcription_callback};
use cueflow::{
    queue::domain::TaskKind,
    supervisor::domain::KeyStatus,
    workflows::services::WebhookReceipt,
};
use rstest::rstest;
use serde_json::json;

fn accept_as(harness: &Harness, request_ids: &[&str]) {
    for id in request_ids {
        harness.gateway.then(
            TaskKind::TranscriptionKickoff,
            Ok(json!({ "request_id": id, "status": "processing" })),
        );
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn callback_completes_the_matching_attempt(harness: Harness) -> eyre::Result<()> {
    accept_as(&harness, &["tr_01"]);
    let recording_id = harness.add_recording()?;

    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(3, 10).await?;
    let body = transcription_callback("tr_01", "Guten Morgen, wie geht's?");
    let receipt = harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 2))
        .await?;
    harness.rounds(2, 10).await?;

    assert_eq!(receipt, WebhookReceipt::Stored);
    assert_eq!(
        harness.gateway.calls(TaskKind::TranscriptionKickoff),
        vec![json!({
            "recording_id": recording_id,
            "audio_location": "s3://audio/session.ogg",
            "model_id": "scribe_v1",
            "webhook": true
        })]
    );
    assert_eq!(
        harness.transcript(recording_id).await?.as_deref(),
        Some("Guten Morgen, wie geht's?")
    );
    let status = harness.engine.transcription_status(recording_id).await?;
    eyre::ensure!(
        matches!(status, KeyStatus::Succeeded(_)),
        "expected a finished transcription, got {status:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_timed_out_attempt_is_followed_by_a_fresh_request() -> eyre::Result<()> {
    let mut settings = config();
    settings.transcription.max_wait_secs = 60;
    let harness = Harness::with_config(settings)?;
    accept_as(&harness, &["tr_first", "tr_second"]);
    let recording_id = harness.add_recording()?;

    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(5, 10).await?;
    assert_eq!(harness.gateway.calls(TaskKind::TranscriptionKickoff).len(), 1);
    harness.rounds(3, 10).await?;
    assert_eq!(harness.gateway.calls(TaskKind::TranscriptionKickoff).len(), 2);

    let body = transcription_callback("tr_second", "Zweiter Versuch");
    harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 0))
        .await?;
    harness.rounds(2, 10).await?;

    assert_eq!(
        harness.transcript(recording_id).await?.as_deref(),
        Some("Zweiter Versuch")
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stale_signatures_fail_the_attempt(harness: Harness) -> eyre::Result<()> {
    accept_as(&harness, &["tr_old", "tr_new"]);
    let recording_id = harness.add_recording()?;
    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(1, 10).await?;

    let body = transcription_callback("tr_old", "Replayed");
    harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 1801))
        .await?;
    harness.rounds(1, 10).await?;

    assert_eq!(harness.transcript(recording_id).await?, None);
    assert_eq!(harness.gateway.calls(TaskKind::TranscriptionKickoff).len(), 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn signatures_that_age_past_tolerance_before_checking_are_rejected(
    harness: Harness,
) -> eyre::Result<()> {
    accept_as(&harness, &["tr_late", "tr_retry"]);
    let recording_id = harness.add_recording()?;
    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(1, 10).await?;

    let body = transcription_callback("tr_late", "Zu spaet geprueft");
    let receipt = harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 1795))
        .await?;
    harness.clock.advance_secs(30);
    harness.rounds(1, 10).await?;

    assert_eq!(receipt, WebhookReceipt::Stored);
    assert_eq!(harness.transcript(recording_id).await?, None);
    assert_eq!(harness.gateway.calls(TaskKind::TranscriptionKickoff).len(), 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn signatures_at_the_tolerance_edge_are_accepted(harness: Harness) -> eyre::Result<()> {
    accept_as(&harness, &["tr_edge"]);
    let recording_id = harness.add_recording()?;
    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(1, 10).await?;

    let body = transcription_callback("tr_edge", "Gerade noch");
    harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 1800))
        .await?;
    harness.rounds(1, 10).await?;

    assert_eq!(
        harness.transcript(recording_id).await?.as_deref(),
        Some("Gerade noch")
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn provider_rejections_count_as_failed_attempts(harness: Harness) -> eyre::Result<()> {
    harness.gateway.then(
        TaskKind::TranscriptionKickoff,
        Err("unsupported audio format".to_owned()),
    );
    harness.gateway.then(
        TaskKind::TranscriptionKickoff,
        Err("unsupported audio format".to_owned()),
    );
    let recording_id = harness.add_recording()?;

    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(4, 10).await?;

    assert_eq!(harness.gateway.calls(TaskKind::TranscriptionKickoff).len(), 2);
    let status = harness.engine.transcription_status(recording_id).await?;
    eyre::ensure!(status.is_stuck(), "expected exhausted transcription, got {status:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn acceptances_without_a_request_id_fail_the_attempt(harness: Harness) -> eyre::Result<()> {
    harness
        .gateway
        .then(TaskKind::TranscriptionKickoff, Ok(json!({ "status": "ok" })));
    accept_as(&harness, &["tr_retry"]);
    let recording_id = harness.add_recording()?;

    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(2, 10).await?;

    assert_eq!(harness.gateway.calls(TaskKind::TranscriptionKickoff).len(), 2);
    let body = transcription_callback("tr_retry", "Noch einmal");
    let receipt = harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 0))
        .await?;
    assert_eq!(receipt, WebhookReceipt::Stored);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_and_malformed_callbacks_are_acknowledged(harness: Harness) -> eyre::Result<()> {
    let unknown = transcription_callback("tr_nobody", "Hallo");

    let unmatched = harness
        .engine
        .receive_transcription_webhook(&unknown, &harness.signature(&unknown, 0))
        .await?;
    let malformed = harness
        .engine
        .receive_transcription_webhook("{\"type\":\"ping\"}", "")
        .await?;

    assert_eq!(unmatched, WebhookReceipt::Unmatched);
    assert_eq!(malformed, WebhookReceipt::Malformed);
    Ok(())
}
