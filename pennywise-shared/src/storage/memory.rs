/// In-memory credential store

use super::{CredentialStore, StorageError, StoredCredentials};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Process-local credential store
///
/// Keeps the same two-key record the file store writes, so partial or garbled
/// records behave identically in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: Mutex<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with credentials
    pub fn with_credentials(credentials: &StoredCredentials) -> Result<Self, StorageError> {
        Ok(MemoryCredentialStore {
            record: Mutex::new(credentials.to_record()?),
        })
    }

    /// Overwrites a single raw key
    ///
    /// Bypasses the pairing rule; meant for simulating a corrupted store.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    /// Returns true if no key is stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        Ok(StoredCredentials::from_record(&self.lock()))
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), StorageError> {
        let record = credentials.to_record()?;
        *self.lock() = record;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock().clear();
        Ok(())
    }
}
