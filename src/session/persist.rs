//! Durable token/user storage. The store must mirror `Authenticated` exactly:
//! populated while authenticated, cleared otherwise.

use crate::session::{errors::StoreError, types::User};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Token/user pair as read back from storage.
#[derive(Clone, Debug)]
pub struct StoredSession {
    pub token: SecretString,
    pub user: User,
}

pub trait PersistentTokenStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backing storage cannot be read or parsed.
    fn read(&self) -> Result<Option<StoredSession>, StoreError>;

    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn write(&self, token: &SecretString, user: &User) -> Result<(), StoreError>;

    /// # Errors
    /// Returns an error if the backing storage cannot be cleared.
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    token: String,
    user: User,
}

/// JSON file store. Writes go through a temp file and a rename so a crash
/// never leaves a half-written session behind.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersistentTokenStore for FileTokenStore {
    fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: StoredRecord = serde_json::from_str(&contents)?;
        if record.token.is_empty() {
            return Ok(None);
        }
        Ok(Some(StoredSession {
            token: SecretString::from(record.token),
            user: record.user,
        }))
    }

    fn write(&self, token: &SecretString, user: &User) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let record = StoredRecord {
            token: token.expose_secret().to_string(),
            user: user.clone(),
        };
        let json = serde_json::to_vec(&record)?;

        let temp_path = self.temp_path();
        let mut file = open_private(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

/// In-process store, for embedding without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<StoredSession>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl PersistentTokenStore for MemoryTokenStore {
    fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        Ok(self.slot.lock().clone())
    }

    fn write(&self, token: &SecretString, user: &User) -> Result<(), StoreError> {
        *self.slot.lock() = Some(StoredSession {
            token: token.clone(),
            user: user.clone(),
        });
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.slot.lock().take();
        Ok(())
    }
}
