/// File-backed credential store
///
/// Persists the two-key record as a small JSON object:
///
/// ```json
/// {
///   "token": "eyJ...",
///   "user": "{\"id\":\"...\",\"email\":\"...\",...}"
/// }
/// ```
///
/// Every write goes to a sibling temporary file which is then renamed over
/// the target, so a crash mid-write leaves either the old pair or the new
/// pair on disk, never one key from each.
///
/// # Example
///
/// ```no_run
/// use pennywise_shared::storage::{CredentialStore, FileCredentialStore};
///
/// # fn example() -> Result<(), pennywise_shared::storage::StorageError> {
/// let store = FileCredentialStore::new(".pennywise/credentials.json");
/// if let Some(creds) = store.load()? {
///     println!("Signed in as {}", creds.user.email);
/// }
/// # Ok(())
/// # }
/// ```

use super::{CredentialStore, StorageError, StoredCredentials};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Credential store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store for the given path
    ///
    /// Nothing is touched on disk until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCredentialStore { path: path.into() }
    }

    /// Path of the credential file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: BTreeMap<String, String> = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Credential file is unreadable, treating as signed out"
                );
                return Ok(None);
            }
        };

        Ok(StoredCredentials::from_record(&record))
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), StorageError> {
        let payload = serde_json::to_vec_pretty(&credentials.to_record()?)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
