//! Durable key-value backends for the credential record.
//!
//! SYSTEM CONTEXT
//! ==============
//! Plays the role browser `localStorage` plays for the web app: string keys,
//! string values, surviving restarts. Multi-key writes are applied in one step
//! so the session record and bearer token can never be observed half-set.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Error raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io failed: {0}")]
    Io(#[from] io::Error),
    #[error("storage encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    /// The backend holds content that cannot be decoded at all.
    #[error("storage contents unreadable: {0}")]
    Corrupt(String),
}

/// String key-value storage that outlives the running client.
pub trait KeyValueStore: Send + Sync {
    /// Read one key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set every entry in one step; readers see all of them or none.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StoreError>;

    /// Remove every listed key in one step. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError>;
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-local backend, used by tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut map = self.entries();
        for (key, value) in entries {
            map.insert((*key).to_owned(), (*value).to_owned());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut map = self.entries();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// JSON-object file backend.
///
/// Every write replaces the whole file through a sibling temp file and a
/// rename, so a crash mid-write leaves either the old or the new contents.
/// Reading an unparseable file fails with [`StoreError::Corrupt`]; the next
/// write or removal replaces it.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    /// Current contents for a rewrite; a corrupt file counts as empty.
    /// The flag reports whether the file was corrupt.
    fn load_for_write(&self) -> Result<(HashMap<String, String>, bool), StoreError> {
        match self.load() {
            Ok(map) => Ok((map, false)),
            Err(StoreError::Corrupt(detail)) => {
                tracing::warn!(%detail, "replacing unreadable storage file");
                Ok((HashMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn persist(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if map.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let raw = serde_json::to_vec_pretty(map)?;
        let tmp = self.tmp_path();
        write_private(&tmp, &raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Sibling temp file, unique per process and per write.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

/// Write `bytes` to `path`, readable only by the owner where supported.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.guard();
        Ok(self.load()?.remove(key))
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let _guard = self.guard();
        let (mut map, _) = self.load_for_write()?;
        for (key, value) in entries {
            map.insert((*key).to_owned(), (*value).to_owned());
        }
        self.persist(&map)
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        let _guard = self.guard();
        let (mut map, corrupt) = self.load_for_write()?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before && !corrupt {
            return Ok(());
        }
        self.persist(&map)
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
