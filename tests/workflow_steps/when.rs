//! When steps for workflow BDD scenarios.

use super::world::{WorkflowWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when("the account deletion is requested")]
fn request_account_deletion(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let account_id = world.account()?;
    let outcome = run_async(
        world
            .harness
            .engine
            .kickoff_account_deletion(account_id, world.harness.now()),
    )
    .wrap_err("kick off account deletion")?;
    world.kickoffs.push(outcome);
    Ok(())
}

#[when("the transcription is requested")]
fn request_transcription(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let recording_id = world.recording()?;
    let outcome = run_async(
        world
            .harness
            .engine
            .kickoff_transcription(recording_id, world.harness.now()),
    )
    .wrap_err("kick off transcription")?;
    world.kickoffs.push(outcome);
    Ok(())
}

#[when("the engine runs for {rounds:usize} rounds of {secs:i64} seconds")]
fn engine_runs(world: &WorkflowWorld, rounds: usize, secs: i64) -> Result<(), eyre::Report> {
    run_async(world.harness.rounds(rounds, secs)).wrap_err("drive the engine")
}

#[when(r#"the provider calls back for "{request_id}" with "{text}" signed {age:i64} seconds ago"#)]
fn provider_calls_back(
    world: &mut WorkflowWorld,
    request_id: String,
    text: String,
    age: i64,
) -> Result<(), eyre::Report> {
    let body = super::helpers::transcription_callback(&request_id, &text);
    let signature = world.harness.signature(&body, age);
    let receipt = run_async(
        world
            .harness
            .engine
            .receive_transcription_webhook(&body, &signature),
    )
    .wrap_err("deliver provider callback")?;
    world.last_receipt = Some(receipt);
    Ok(())
}
