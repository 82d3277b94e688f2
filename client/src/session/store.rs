//! Durable token storage.
//!
//! A single durable key holds the backend bearer token. Absence of the key
//! means "not authenticated", whatever the in-memory identity says.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token storage errors.
#[derive(Debug, Error)]
pub enum VaultError {
    /// OS keyring failure.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// File store I/O failure.
    #[error("Token file error: {0}")]
    Io(#[from] std::io::Error),

    /// File store contents could not be parsed.
    #[error("Corrupt token file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Backend for the durable bearer token.
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any.
    fn load(&self) -> Result<Option<String>, VaultError>;

    /// Replace the stored token.
    fn save(&self, token: &str) -> Result<(), VaultError>;

    /// Remove the stored token. Removing a missing token is not an error.
    fn clear(&self) -> Result<(), VaultError>;
}

// ============================================================================
// Keyring
// ============================================================================

const KEYRING_SERVICE: &str = "newssphere";

/// Token kept in the OS keyring under one entry name.
pub struct KeyringTokenStore {
    user: String,
}

impl KeyringTokenStore {
    /// Store under an explicit entry name.
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    /// Backend access token, keyed by backend URL so several backends can coexist.
    pub fn access_token(api_url: &str) -> Self {
        Self::new(format!("access-token:{api_url}"))
    }

    /// Identity provider refresh token.
    pub fn identity_refresh_token(auth_url: &str) -> Self {
        Self::new(format!("identity-refresh:{auth_url}"))
    }

    fn entry(&self) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(KEYRING_SERVICE, &self.user)
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<String>, VaultError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), VaultError> {
        Ok(self.entry()?.set_password(token)?)
    }

    fn clear(&self) -> Result<(), VaultError> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// File
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// File name of the backend access token.
pub const SESSION_FILE: &str = "session.json";

/// File name of the identity provider refresh token.
pub const IDENTITY_FILE: &str = "identity.json";

/// Token kept in a JSON file under a data directory.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store in `dir/file_name`, creating the directory if needed.
    pub fn new(dir: &Path, file_name: &str) -> Result<Self, VaultError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(file_name),
        })
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, VaultError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let file: TokenFile = serde_json::from_str(&contents)?;
                Ok(Some(file.token).filter(|t| !t.is_empty()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), VaultError> {
        let contents = serde_json::to_string(&TokenFile {
            token: token.to_string(),
        })?;
        // Readers never observe a half-written token.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), VaultError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Token kept in process memory.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token, as if left over from a previous run.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, VaultError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &str) -> Result<(), VaultError> {
        *self
            .token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), VaultError> {
        *self
            .token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_file_store_save_load_clear() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path(), SESSION_FILE).unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.save("tok-1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("tok-1"));

        store.save("tok-2").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("tok-2"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        FileTokenStore::new(dir.path(), SESSION_FILE).unwrap().save("persisted").unwrap();

        let reopened = FileTokenStore::new(dir.path(), SESSION_FILE).unwrap();
        assert_eq!(reopened.load().unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_file_store_reports_corruption() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        let store = FileTokenStore::new(dir.path(), SESSION_FILE).unwrap();
        assert!(matches!(store.load(), Err(VaultError::Corrupt(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_token("seed");
        assert_eq!(store.load().unwrap().as_deref(), Some("seed"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
