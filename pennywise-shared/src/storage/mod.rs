/// Credential persistence port
///
/// The client persists exactly two string-valued keys across restarts:
///
/// - `token`: the bearer credential
/// - `user`: the serialized user snapshot
///
/// Both keys are always written together and removed together; a store that
/// holds only one of them (or an unreadable snapshot) reports no session.
///
/// # Implementations
///
/// - [`MemoryCredentialStore`]: process-local, for tests and ephemeral shells
/// - [`FileCredentialStore`]: JSON file replaced atomically on every write
///
/// # Example
///
/// ```
/// use pennywise_shared::storage::{CredentialStore, MemoryCredentialStore, StoredCredentials};
/// use pennywise_shared::models::User;
///
/// # fn example() -> Result<(), pennywise_shared::storage::StorageError> {
/// let store = MemoryCredentialStore::new();
/// let user = User {
///     id: "u1".into(),
///     name: "Ada".into(),
///     email: "ada@example.com".into(),
///     pin_hash: None,
///     is_pro: false,
/// };
///
/// store.save(&StoredCredentials::new("token".into(), user))?;
/// assert!(store.load()?.is_some());
///
/// store.clear()?;
/// assert!(store.load()?.is_none());
/// # Ok(())
/// # }
/// ```

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use crate::models::User;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Key holding the serialized user snapshot
pub const USER_KEY: &str = "user";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A token and the user snapshot it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub token: String,
    pub user: User,
}

impl StoredCredentials {
    pub fn new(token: String, user: User) -> Self {
        StoredCredentials { token, user }
    }

    /// Encodes the pair as the two persisted string values
    pub fn to_record(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let mut record = BTreeMap::new();
        record.insert(TOKEN_KEY.to_string(), self.token.clone());
        record.insert(USER_KEY.to_string(), serde_json::to_string(&self.user)?);
        Ok(record)
    }

    /// Decodes a persisted record
    ///
    /// Returns `None` when either key is missing or the snapshot is
    /// unreadable.
    pub fn from_record(record: &BTreeMap<String, String>) -> Option<Self> {
        let token = record.get(TOKEN_KEY).filter(|t| !t.is_empty())?;
        let user = record.get(USER_KEY)?;

        match serde_json::from_str::<User>(user) {
            Ok(user) => Some(StoredCredentials::new(token.clone(), user)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable user snapshot");
                None
            }
        }
    }
}

/// Durable key-value surface for session credentials
///
/// Writers must go through [`CredentialStore::save`] so the token and user
/// snapshot are never persisted independently.
pub trait CredentialStore: Send + Sync {
    /// Loads the persisted credentials, if a complete pair exists
    fn load(&self) -> Result<Option<StoredCredentials>, StorageError>;

    /// Persists the token and user snapshot together
    fn save(&self, credentials: &StoredCredentials) -> Result<(), StorageError>;

    /// Removes both keys; succeeds if nothing was stored
    fn clear(&self) -> Result<(), StorageError>;
}
