//! Whole workflows with engine records kept in `PostgreSQL`.

use super::database::TemporaryDatabase;
use crate::helpers::{Harness, config, transcription_callback};
use cueflow::{
    engine::EnginePorts,
    queue::domain::TaskKind,
    supervisor::{domain::KeyStatus, services::KickoffOutcome},
    workflows::{
        domain::{Channel, MessageId, NotificationRequest},
        services::{DeletionPhase, WebhookReceipt},
    },
};
use serde_json::json;

fn harness_on(database: &TemporaryDatabase) -> eyre::Result<Harness> {
    let pool = database.pool();
    Harness::with_storage(config(), |directory, library| {
        EnginePorts::postgres(&pool, directory, library)
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn emails_retry_until_delivered() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let harness = harness_on(&database)?;
    harness
        .gateway
        .then(TaskKind::Email, Err("throttled".to_owned()));
    harness.gateway.always(TaskKind::Email, Ok(json!({})));
    let request = NotificationRequest::email(
        MessageId::new(),
        "pg@example.com",
        "Welcome, {{ name }}",
        "Your first deck is ready.",
        json!({ "name": "Noor" }),
    );

    let first = harness.engine.kickoff_email(&request, harness.now()).await?;
    let second = harness.engine.kickoff_email(&request, harness.now()).await?;
    harness.rounds(4, 30).await?;

    let KickoffOutcome::Started { workflow_task_id } = first else {
        eyre::bail!("expected a started task, got {first:?}");
    };
    assert_eq!(
        second,
        KickoffOutcome::AlreadyInProgress { workflow_task_id }
    );
    assert_eq!(harness.gateway.calls(TaskKind::Email).len(), 2);
    let status = harness
        .engine
        .delivery_status(Channel::Email, request.message_id)
        .await?;
    eyre::ensure!(
        matches!(status, KeyStatus::Succeeded(_)),
        "expected delivered email, got {status:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn account_deletion_completes_over_postgres() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let harness = harness_on(&database)?;
    harness.gateway.always(TaskKind::FileDelete, Ok(json!({})));
    let account_id = harness.add_account("pg-leaving@example.com")?;
    harness.add_files(account_id, &["s3://decks/a.json", "s3://decks/b.json"])?;

    harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;
    harness.rounds(10, 10).await?;

    let status = harness.engine.deletion_status(account_id).await?;
    assert_eq!(status.phase, DeletionPhase::Complete);
    assert!(status.anonymized);
    assert_eq!(harness.gateway.calls(TaskKind::FileDelete).len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn transcription_callbacks_are_matched_through_stored_requests() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let harness = harness_on(&database)?;
    harness.gateway.then(
        TaskKind::TranscriptionKickoff,
        Ok(json!({ "request_id": "tr_pg", "status": "processing" })),
    );
    let recording_id = harness.add_recording()?;

    harness
        .engine
        .kickoff_transcription(recording_id, harness.now())
        .await?;
    harness.rounds(2, 10).await?;
    let body = transcription_callback("tr_pg", "Bonjour tout le monde");
    let first = harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 5))
        .await?;
    let replay = harness
        .engine
        .receive_transcription_webhook(&body, &harness.signature(&body, 5))
        .await?;
    harness.rounds(2, 10).await?;

    assert_eq!(first, WebhookReceipt::Stored);
    assert_eq!(replay, WebhookReceipt::Duplicate);
    assert_eq!(
        harness.transcript(recording_id).await?.as_deref(),
        Some("Bonjour tout le monde")
    );
    Ok(())
}
