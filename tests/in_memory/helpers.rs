//! Shared harness for in-memory engine integration tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cueflow::{
    clock::{ManualClock, SharedClock},
    config::{EngineConfig, Secret},
    engine::{Engine, EnginePorts},
    queue::domain::TaskKind,
    worker::{ProviderError, ProviderGateway, Worker},
    workflows::{
        adapters::memory::{InMemoryAccountDirectory, InMemoryRecordingLibrary},
        domain::{AccountId, AccountProfile, FileId, RecordingId, sign},
        ports::{AccountDirectory, RecordingLibrary},
    },
};
use mockable::Clock;
use rstest::fixture;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Secret shared with the simulated transcription provider.
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Provider outcome as scripted by a test.
pub type Outcome = Result<Value, String>;

/// Provider double answering from per-kind scripts.
///
/// Scripted outcomes are consumed in order; once a kind's script runs out
/// its standing outcome applies. Kinds with neither fail.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<TaskKind, VecDeque<Outcome>>>,
    standing: Mutex<HashMap<TaskKind, Outcome>>,
    calls: Mutex<Vec<(TaskKind, Value)>>,
}

impl ScriptedGateway {
    /// Answers every call of `kind` with `outcome` once scripts run out.
    pub fn always(&self, kind: TaskKind, outcome: Outcome) {
        lock(&self.standing).insert(kind, outcome);
    }

    /// Queues `outcome` for the next unscripted call of `kind`.
    pub fn then(&self, kind: TaskKind, outcome: Outcome) {
        lock(&self.scripts).entry(kind).or_default().push_back(outcome);
    }

    /// Inputs sent for `kind`, oldest first.
    #[must_use]
    pub fn calls(&self, kind: TaskKind) -> Vec<Value> {
        lock(&self.calls)
            .iter()
            .filter(|(called, _)| *called == kind)
            .map(|(_, input)| input.clone())
            .collect()
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn perform(&self, kind: TaskKind, input: Value) -> Result<Value, ProviderError> {
        lock(&self.calls).push((kind, input));
        let scripted = lock(&self.scripts)
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        let outcome = scripted
            .or_else(|| lock(&self.standing).get(&kind).cloned())
            .unwrap_or_else(|| Err(format!("no outcome scripted for {kind}")));
        outcome.map_err(ProviderError)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Engine, worker and collaborators wired over in-memory adapters.
pub struct Harness {
    /// Clock shared by every service.
    pub clock: ManualClock,
    /// Instant the clock started at.
    pub start: DateTime<Utc>,
    /// Account and file collaborator.
    pub directory: Arc<InMemoryAccountDirectory>,
    /// Recording collaborator.
    pub library: Arc<InMemoryRecordingLibrary>,
    /// Provider double.
    pub gateway: Arc<ScriptedGateway>,
    /// Engine under test.
    pub engine: Engine,
    /// Worker draining the engine's queue through the provider double.
    pub worker: Worker,
}

impl Harness {
    /// Builds a harness over `config` with in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the configuration.
    pub fn with_config(config: EngineConfig) -> eyre::Result<Self> {
        Self::with_storage(config, EnginePorts::in_memory)
    }

    /// Builds a harness over `config`, letting `storage` choose where the
    /// engine keeps its own records.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the configuration.
    pub fn with_storage(
        config: EngineConfig,
        storage: impl FnOnce(Arc<dyn AccountDirectory>, Arc<dyn RecordingLibrary>) -> EnginePorts,
    ) -> eyre::Result<Self> {
        let start = Utc
            .with_ymd_and_hms(2026, 4, 1, 8, 0, 0)
            .single()
            .ok_or_else(|| eyre::eyre!("ambiguous start time"))?;
        let clock = ManualClock::new(start);
        let directory = Arc::new(InMemoryAccountDirectory::new());
        let library = Arc::new(InMemoryRecordingLibrary::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let shared_clock: SharedClock = Arc::new(clock.clone());
        let directory_port: Arc<dyn AccountDirectory> = directory.clone();
        let library_port: Arc<dyn RecordingLibrary> = library.clone();
        let engine = Engine::new(config, shared_clock, storage(directory_port, library_port))?;
        let worker = Worker::for_engine(&engine, gateway.clone());
        Ok(Self {
            clock,
            start,
            directory,
            library,
            gateway,
            engine,
            worker,
        })
    }

    /// Current engine time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Moves the clock to `secs` seconds after the start.
    pub fn at(&self, secs: i64) {
        self.clock.set(self.start + chrono::Duration::seconds(secs));
    }

    /// Runs every task due now and returns how many were claimed.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue fails.
    pub async fn drain(&self) -> eyre::Result<usize> {
        Ok(self.worker.run_until_idle(500).await?)
    }

    /// Drains the queue, then advances the clock by `step_secs`, `rounds`
    /// times over.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue fails.
    pub async fn rounds(&self, rounds: usize, step_secs: i64) -> eyre::Result<()> {
        for _ in 0..rounds {
            self.drain().await?;
            self.clock.advance_secs(step_secs);
        }
        Ok(())
    }

    /// Adds an account with contact details.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory rejects the account.
    pub fn add_account(&self, email: &str) -> eyre::Result<AccountId> {
        let id = AccountId::new();
        self.directory
            .add_account(AccountProfile::new(id, email, "Learner"))?;
        Ok(id)
    }

    /// Adds live files to an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn add_files(&self, account_id: AccountId, locations: &[&str]) -> eyre::Result<Vec<FileId>> {
        locations
            .iter()
            .map(|location| -> eyre::Result<FileId> {
                Ok(self.directory.add_file(account_id, *location)?)
            })
            .collect()
    }

    /// Adds a recording for a fresh account.
    ///
    /// # Errors
    ///
    /// Returns an error if the collaborators reject the records.
    pub fn add_recording(&self) -> eyre::Result<RecordingId> {
        let account_id = self.add_account("speaker@example.com")?;
        Ok(self
            .library
            .add_recording(account_id, "s3://audio/session.ogg")?)
    }

    /// Stored transcript of a recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the recording is unknown.
    pub async fn transcript(&self, recording_id: RecordingId) -> eyre::Result<Option<String>> {
        let recording = self
            .library
            .find_recording(recording_id)
            .await?
            .ok_or_else(|| eyre::eyre!("recording {recording_id} missing"))?;
        Ok(recording.transcript)
    }

    /// Signs `body` as the provider would, `age_secs` before now.
    #[must_use]
    pub fn signature(&self, body: &str, age_secs: i64) -> String {
        sign(
            WEBHOOK_SECRET,
            self.now().timestamp().saturating_sub(age_secs),
            body,
        )
    }
}

/// Default configuration with the integration webhook secret.
#[must_use]
pub fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.transcription.webhook_secret = Secret::new(WEBHOOK_SECRET);
    config
}

/// Provides a harness over the default configuration.
#[fixture]
pub fn harness() -> Harness {
    Harness::with_config(config()).expect("harness should build")
}

/// Callback body the transcription provider posts.
#[must_use]
pub fn transcription_callback(request_id: &str, text: &str) -> String {
    json!({
        "type": "speech_to_text_transcription",
        "event_timestamp": 1_775_030_400,
        "data": {
            "request_id": request_id,
            "transcription": { "language_code": "de", "text": text }
        }
    })
    .to_string()
}
