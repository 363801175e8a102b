use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::MsError;

/// Disk-backed key-value store for authentication artifacts.
///
/// The on-disk format is a single JSON object mapping credential key to the
/// last known-good value. Every successful `set` rewrites the whole file
/// synchronously, last writer wins. A missing or corrupted file loads as an
/// empty store rather than failing: stale credentials are recoverable, a
/// broken cache file is not worth aborting over.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl CredentialStore {
    /// Opens (or lazily creates) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path);
        Self { path, entries }
    }

    fn load(path: &Path) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "credential store unreadable, starting empty");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "credential store corrupted, starting empty");
                BTreeMap::new()
            }
        }
    }

    /// Returns the last successfully persisted value for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    /// Persists `value` under `key`, overwriting any prior value.
    ///
    /// An empty `value` is a silent no-op: a blank token must never clobber a
    /// previously working one.
    ///
    /// # Errors
    ///
    /// Returns `MsError::Io` if the file cannot be written.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), MsError> {
        if value.is_empty() {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    /// Removes all entries and rewrites the file.
    ///
    /// # Errors
    ///
    /// Returns `MsError::Io` if the file cannot be written.
    pub fn clear(&mut self) -> Result<(), MsError> {
        self.entries.clear();
        self.flush()
    }

    fn flush(&self) -> Result<(), MsError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, body)?;
        Ok(())
    }
}
