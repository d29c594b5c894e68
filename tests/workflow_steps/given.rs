//! Given steps for workflow BDD scenarios.

use super::world::WorkflowWorld;
use cueflow::queue::domain::TaskKind;
use rstest_bdd_macros::given;
use serde_json::json;

#[given("an account with {count:usize} stored files")]
fn account_with_files(world: &mut WorkflowWorld, count: usize) -> Result<(), eyre::Report> {
    let account_id = world.harness.add_account("scenario@example.com")?;
    let locations: Vec<String> = (1..=count)
        .map(|n| format!("s3://scenario/file-{n}.bin"))
        .collect();
    let borrowed: Vec<&str> = locations.iter().map(String::as_str).collect();
    world.files = world.harness.add_files(account_id, &borrowed)?;
    world.account_id = Some(account_id);
    Ok(())
}

#[given("storage deletes files successfully")]
fn storage_deletes(world: &WorkflowWorld) {
    world
        .harness
        .gateway
        .always(TaskKind::FileDelete, Ok(json!({ "deleted": true })));
}

#[given("storage refuses to delete files")]
fn storage_refuses(world: &WorkflowWorld) {
    world
        .harness
        .gateway
        .always(TaskKind::FileDelete, Err("access denied".to_owned()));
}

#[given("a recording awaiting transcription")]
fn recording_awaiting(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    world.recording_id = Some(world.harness.add_recording()?);
    Ok(())
}

#[given(r#"the provider accepts the next request as "{request_id}""#)]
fn provider_accepts(world: &WorkflowWorld, request_id: String) {
    world.harness.gateway.then(
        TaskKind::TranscriptionKickoff,
        Ok(json!({ "request_id": request_id })),
    );
}
