//! Then steps for workflow BDD scenarios.

use super::world::{WorkflowWorld, run_async};
use cueflow::{
    queue::domain::TaskKind,
    supervisor::services::KickoffOutcome,
    workflows::{
        ports::AccountDirectory,
        services::{DeletionPhase, WebhookReceipt},
    },
};
use rstest_bdd_macros::then;
use serde_json::Value;

fn parse_label<T: serde::de::DeserializeOwned>(label: &str) -> Result<T, eyre::Report> {
    serde_json::from_value(Value::String(label.to_owned()))
        .map_err(|err| eyre::eyre!("unknown label {label:?} in scenario: {err}"))
}

#[then(r#"the account deletion phase is "{phase}""#)]
fn deletion_phase_is(world: &WorkflowWorld, phase: String) -> Result<(), eyre::Report> {
    let expected: DeletionPhase = parse_label(&phase)?;
    let status = run_async(world.harness.engine.deletion_status(world.account()?))?;
    eyre::ensure!(
        status.phase == expected,
        "expected phase {expected:?}, found {:?}",
        status.phase
    );
    Ok(())
}

#[then("every file is deleted")]
fn every_file_deleted(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    for file_id in &world.files {
        let file = run_async(world.harness.directory.find_file(*file_id))?
            .ok_or_else(|| eyre::eyre!("file {file_id} missing"))?;
        eyre::ensure!(file.is_deleted(), "file {file_id} still stored");
    }
    Ok(())
}

#[then("the account is anonymized")]
fn account_anonymized(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let profile = world
        .harness
        .directory
        .profile(world.account()?)?
        .ok_or_else(|| eyre::eyre!("profile missing"))?;
    eyre::ensure!(profile.is_anonymized(), "profile still holds personal data");
    eyre::ensure!(profile.email.is_none(), "email survived anonymization");
    Ok(())
}

#[then("the account keeps its personal data")]
fn account_keeps_data(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let profile = world
        .harness
        .directory
        .profile(world.account()?)?
        .ok_or_else(|| eyre::eyre!("profile missing"))?;
    eyre::ensure!(!profile.is_anonymized(), "profile was anonymized");
    Ok(())
}

#[then("the undeletable files are reported stuck")]
fn files_reported_stuck(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let status = run_async(world.harness.engine.deletion_status(world.account()?))?;
    eyre::ensure!(
        status.stuck_files == world.files,
        "expected stuck files {:?}, found {:?}",
        world.files,
        status.stuck_files
    );
    Ok(())
}

#[then("the second request joins the running deletion")]
fn second_request_joins(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let [first, second] = world.kickoffs.as_slice() else {
        eyre::bail!("expected two kickoffs, found {}", world.kickoffs.len());
    };
    let KickoffOutcome::Started { workflow_task_id } = first else {
        eyre::bail!("first kickoff did not start a task: {first:?}");
    };
    eyre::ensure!(
        *second
            == KickoffOutcome::AlreadyInProgress {
                workflow_task_id: *workflow_task_id
            },
        "second kickoff created new work: {second:?}"
    );
    Ok(())
}

#[then(r#"the callback receipt is "{receipt}""#)]
fn callback_receipt_is(world: &WorkflowWorld, receipt: String) -> Result<(), eyre::Report> {
    let expected: WebhookReceipt = parse_label(&receipt)?;
    eyre::ensure!(
        world.last_receipt == Some(expected),
        "expected receipt {expected:?}, found {:?}",
        world.last_receipt
    );
    Ok(())
}

#[then(r#"the recording transcript is "{text}""#)]
fn transcript_is(world: &WorkflowWorld, text: String) -> Result<(), eyre::Report> {
    let stored = run_async(world.harness.transcript(world.recording()?))?;
    eyre::ensure!(
        stored.as_deref() == Some(text.as_str()),
        "expected transcript {text:?}, found {stored:?}"
    );
    Ok(())
}

#[then("the recording has no transcript")]
fn no_transcript(world: &WorkflowWorld) -> Result<(), eyre::Report> {
    let stored = run_async(world.harness.transcript(world.recording()?))?;
    eyre::ensure!(stored.is_none(), "unexpected transcript {stored:?}");
    Ok(())
}

#[then("the provider received {count:usize} transcription requests")]
fn provider_received(world: &WorkflowWorld, count: usize) -> Result<(), eyre::Report> {
    let sent = world
        .harness
        .gateway
        .calls(TaskKind::TranscriptionKickoff)
        .len();
    eyre::ensure!(sent == count, "expected {count} requests, provider saw {sent}");
    Ok(())
}
