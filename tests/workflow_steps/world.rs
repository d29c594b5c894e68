//! Shared world state for workflow BDD scenarios.

use super::helpers::{Harness, config};
use cueflow::{
    supervisor::services::KickoffOutcome,
    workflows::{
        domain::{AccountId, FileId, RecordingId},
        services::WebhookReceipt,
    },
};
use rstest::fixture;

/// Scenario world for workflow behaviour tests.
pub struct WorkflowWorld {
    /// Engine, worker and collaborators under test.
    pub harness: Harness,
    /// Account created by the scenario.
    pub account_id: Option<AccountId>,
    /// Files owned by that account.
    pub files: Vec<FileId>,
    /// Recording created by the scenario.
    pub recording_id: Option<RecordingId>,
    /// Kickoff outcomes, oldest first.
    pub kickoffs: Vec<KickoffOutcome>,
    /// Receipt of the last provider callback.
    pub last_receipt: Option<WebhookReceipt>,
}

impl WorkflowWorld {
    /// Creates a world over a fresh in-memory engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be assembled.
    pub fn new() -> eyre::Result<Self> {
        Ok(Self {
            harness: Harness::with_config(config())?,
            account_id: None,
            files: Vec::new(),
            recording_id: None,
            kickoffs: Vec::new(),
            last_receipt: None,
        })
    }

    /// Returns the scenario's account.
    ///
    /// # Errors
    ///
    /// Returns an error if no account was created.
    pub fn account(&self) -> eyre::Result<AccountId> {
        self.account_id
            .ok_or_else(|| eyre::eyre!("missing account in scenario world"))
    }

    /// Returns the scenario's recording.
    ///
    /// # Errors
    ///
    /// Returns an error if no recording was created.
    pub fn recording(&self) -> eyre::Result<RecordingId> {
        self.recording_id
            .ok_or_else(|| eyre::eyre!("missing recording in scenario world"))
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WorkflowWorld {
    WorkflowWorld::new().expect("scenario world should build")
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
