//! In-memory account directory and recording library.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::workflows::{
    domain::{AccountId, AccountProfile, FileId, Recording, RecordingId, StoredFile},
    ports::{AccountDirectory, CollaboratorError, CollaboratorResult, RecordingLibrary},
};

/// Thread-safe in-memory account directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    accounts: HashMap<AccountId, AccountProfile>,
    files: HashMap<FileId, StoredFile>,
}

impl InMemoryAccountDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account profile.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Persistence`] when the lock is poisoned.
    pub fn add_account(&self, profile: AccountProfile) -> CollaboratorResult<()> {
        self.write()?.accounts.insert(profile.id, profile);
        Ok(())
    }

    /// Adds a live file owned by `account_id` and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::UnknownAccount`] when the owner does not
    /// exist.
    pub fn add_file(
        &self,
        account_id: AccountId,
        location: impl Into<String>,
    ) -> CollaboratorResult<FileId> {
        let mut state = self.write()?;
        if !state.accounts.contains_key(&account_id) {
            return Err(CollaboratorError::UnknownAccount(account_id));
        }
        let id = FileId::new();
        state.files.insert(
            id,
            StoredFile {
                id,
                account_id,
                location: location.into(),
                deleted_at: None,
            },
        );
        Ok(id)
    }

    /// Returns a snapshot of an account profile.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Persistence`] when the lock is poisoned.
    pub fn profile(&self, id: AccountId) -> CollaboratorResult<Option<AccountProfile>> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    fn read(&self) -> CollaboratorResult<RwLockReadGuard<'_, DirectoryState>> {
        self.state
            .read()
            .map_err(|err| CollaboratorError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> CollaboratorResult<RwLockWriteGuard<'_, DirectoryState>> {
        self.state
            .write()
            .map_err(|err| CollaboratorError::persistence(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn account_exists(&self, id: AccountId) -> CollaboratorResult<bool> {
        Ok(self.read()?.accounts.contains_key(&id))
    }

    async fn files_owned_by(&self, id: AccountId) -> CollaboratorResult<Vec<StoredFile>> {
        let state = self.read()?;
        let mut files: Vec<StoredFile> = state
            .files
            .values()
            .filter(|file| file.account_id == id)
            .cloned()
            .collect();
        files.sort_by_key(|file| file.id);
        Ok(files)
    }

    async fn find_file(&self, id: FileId) -> CollaboratorResult<Option<StoredFile>> {
        Ok(self.read()?.files.get(&id).cloned())
    }

    async fn mark_file_deleted(&self, id: FileId, at: DateTime<Utc>) -> CollaboratorResult<bool> {
        let mut state = self.write()?;
        let file = state
            .files
            .get_mut(&id)
            .ok_or(CollaboratorError::UnknownFile(id))?;
        if file.is_deleted() {
            return Ok(false);
        }
        file.deleted_at = Some(at);
        Ok(true)
    }

    async fn is_anonymized(&self, id: AccountId) -> CollaboratorResult<bool> {
        self.read()?
            .accounts
            .get(&id)
            .map(AccountProfile::is_anonymized)
            .ok_or(CollaboratorError::UnknownAccount(id))
    }

    async fn anonymize(&self, id: AccountId, at: DateTime<Utc>) -> CollaboratorResult<bool> {
        let mut state = self.write()?;
        let profile = state
            .accounts
            .get_mut(&id)
            .ok_or(CollaboratorError::UnknownAccount(id))?;
        if profile.is_anonymized() {
            return Ok(false);
        }
        profile.email = None;
        profile.display_name = None;
        profile.phone = None;
        profile.anonymized_at = Some(at);
        Ok(true)
    }
}

/// Thread-safe in-memory recording library.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordingLibrary {
    recordings: Arc<RwLock<HashMap<RecordingId, Recording>>>,
}

impl InMemoryRecordingLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an untranscribed recording and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Persistence`] when the lock is poisoned.
    pub fn add_recording(
        &self,
        account_id: AccountId,
        audio_location: impl Into<String>,
    ) -> CollaboratorResult<RecordingId> {
        let id = RecordingId::new();
        self.recordings
            .write()
            .map_err(|err| CollaboratorError::persistence(std::io::Error::other(err.to_string())))?
            .insert(
                id,
                Recording {
                    id,
                    account_id,
                    audio_location: audio_location.into(),
                    transcript: None,
                },
            );
        Ok(id)
    }
}

#[async_trait]
impl RecordingLibrary for InMemoryRecordingLibrary {
    async fn find_recording(&self, id: RecordingId) -> CollaboratorResult<Option<Recording>> {
        let recordings = self
            .recordings
            .read()
            .map_err(|err| CollaboratorError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(recordings.get(&id).cloned())
    }

    async fn store_transcript(
        &self,
        id: RecordingId,
        text: &str,
        _at: DateTime<Utc>,
    ) -> CollaboratorResult<bool> {
        let mut recordings = self
            .recordings
            .write()
            .map_err(|err| CollaboratorError::persistence(std::io::Error::other(err.to_string())))?;
        let recording = recordings
            .get_mut(&id)
            .ok_or(CollaboratorError::UnknownRecording(id))?;
        if recording.is_transcribed() {
            return Ok(false);
        }
        recording.transcript = Some(text.to_owned());
        Ok(true)
    }
}
