//! In-memory integration tests for cascading account deletion.

use super::helpers::{Harness, harness};
use cueflow::{
    queue::domain::TaskKind,
    supervisor::services::KickoffOutcome,
    workflows::{ports::AccountDirectory, services::DeletionPhase},
};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn files_are_deleted_before_the_account_is_anonymized(harness: Harness) -> eyre::Result<()> {
    harness
        .gateway
        .always(TaskKind::FileDelete, Ok(json!({ "deleted": true })));
    let account_id = harness.add_account("leaving@example.com")?;
    let files = harness.add_files(
        account_id,
        &["s3://decks/1.json", "s3://decks/2.json", "s3://audio/3.ogg"],
    )?;

    let before = harness.engine.deletion_status(account_id).await?;
    harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;
    for _ in 0..10 {
        let status = harness.engine.deletion_status(account_id).await?;
        eyre::ensure!(
            status.pending_files.is_empty() || !status.anonymized,
            "account anonymized while {} files remain",
            status.pending_files.len()
        );
        harness.rounds(1, 10).await?;
    }

    assert_eq!(before.phase, DeletionPhase::NotStarted);
    let after = harness.engine.deletion_status(account_id).await?;
    assert_eq!(after.phase, DeletionPhase::Complete);
    assert!(after.anonymized);
    assert!(harness.engine.all_files_deleted(account_id).await?);
    assert_eq!(harness.gateway.calls(TaskKind::FileDelete).len(), files.len());
    let profile = harness
        .directory
        .profile(account_id)?
        .ok_or_else(|| eyre::eyre!("profile missing"))?;
    assert_eq!(profile.email, None);
    assert_eq!(profile.phone, None);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deletion_reports_the_files_phase_while_storage_is_slow(
    harness: Harness,
) -> eyre::Result<()> {
    harness
        .gateway
        .then(TaskKind::FileDelete, Err("timeout".to_owned()));
    harness.gateway.always(TaskKind::FileDelete, Ok(json!({})));
    let account_id = harness.add_account("slow@example.com")?;
    let files = harness.add_files(account_id, &["s3://decks/big.json"])?;

    harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;
    harness.rounds(1, 1).await?;

    let status = harness.engine.deletion_status(account_id).await?;
    assert_eq!(status.phase, DeletionPhase::Files);
    assert_eq!(status.pending_files, files);
    assert!(status.stuck_files.is_empty());
    for file_id in &files {
        assert!(!harness.engine.is_file_deletion_stuck(*file_id).await?);
    }

    harness.rounds(8, 30).await?;
    assert_eq!(
        harness.engine.deletion_status(account_id).await?.phase,
        DeletionPhase::Complete
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_stuck_file_fails_the_deletion_and_keeps_personal_data(
    harness: Harness,
) -> eyre::Result<()> {
    harness
        .gateway
        .always(TaskKind::FileDelete, Err("access denied".to_owned()));
    let account_id = harness.add_account("stuck@example.com")?;
    let files = harness.add_files(account_id, &["s3://locked/1.bin"])?;

    harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;
    harness.rounds(12, 30).await?;

    let status = harness.engine.deletion_status(account_id).await?;
    assert_eq!(status.phase, DeletionPhase::Failed);
    assert_eq!(status.stuck_files, files);
    assert!(!status.anonymized);
    assert!(!status.anonymization_stuck);
    assert_eq!(harness.gateway.calls(TaskKind::FileDelete).len(), 3);

    harness.clock.advance_secs(86_400);
    assert_eq!(harness.drain().await?, 0, "a failed deletion leaves nothing queued");
    assert_eq!(
        harness.engine.deletion_status(account_id).await?.phase,
        DeletionPhase::Failed
    );
    assert_eq!(harness.gateway.calls(TaskKind::FileDelete).len(), 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn operators_recover_by_retrying_the_stuck_file(harness: Harness) -> eyre::Result<()> {
    harness
        .gateway
        .then(TaskKind::FileDelete, Err("access denied".to_owned()));
    harness
        .gateway
        .then(TaskKind::FileDelete, Err("access denied".to_owned()));
    harness
        .gateway
        .then(TaskKind::FileDelete, Err("access denied".to_owned()));
    harness.gateway.always(TaskKind::FileDelete, Ok(json!({})));
    let account_id = harness.add_account("recover@example.com")?;
    let files = harness.add_files(account_id, &["s3://locked/2.bin"])?;
    let file_id = *files
        .first()
        .ok_or_else(|| eyre::eyre!("no file created"))?;
    harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;
    harness.rounds(12, 30).await?;
    eyre::ensure!(
        harness.engine.deletion_status(account_id).await?.phase == DeletionPhase::Failed,
        "deletion should have failed first"
    );

    let file_retry = harness
        .engine
        .kickoff_file_deletion(file_id, harness.now())
        .await?;
    let account_retry = harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;
    harness.rounds(6, 30).await?;

    eyre::ensure!(
        matches!(file_retry, KickoffOutcome::Started { .. }),
        "file retry should start, got {file_retry:?}"
    );
    eyre::ensure!(
        matches!(account_retry, KickoffOutcome::Started { .. }),
        "account retry should start, got {account_retry:?}"
    );
    let status = harness.engine.deletion_status(account_id).await?;
    assert_eq!(status.phase, DeletionPhase::Complete);
    let file = harness
        .directory
        .find_file(file_id)
        .await?
        .ok_or_else(|| eyre::eyre!("file missing"))?;
    assert!(file.is_deleted());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_kickoffs_share_one_root_task(harness: Harness) -> eyre::Result<()> {
    let account_id = harness.add_account("twice@example.com")?;

    let first = harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;
    let second = harness
        .engine
        .kickoff_account_deletion(account_id, harness.now())
        .await?;

    let KickoffOutcome::Started { workflow_task_id } = first else {
        eyre::bail!("expected a started task, got {first:?}");
    };
    assert_eq!(
        second,
        KickoffOutcome::AlreadyInProgress { workflow_task_id }
    );
    Ok(())
}
