//! Key-value persistence behind [`super::HistoryStore`].
//!
//! History needs three blob operations under a single key. Anything that can
//! get, set and remove a byte blob can back it. There are no transactions and
//! concurrent writers to the same key get last-writer-wins.

use crate::error::ScanError;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::debug;

/// Blob storage addressed by string keys.
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`, or `None` if there is none.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ScanError>;

    /// Replace the blob stored under `key`. Either the whole blob is stored
    /// or, on error, the previous one is left in place.
    fn set(&self, key: &str, blob: &[u8]) -> Result<(), ScanError>;

    /// Delete the blob under `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), ScanError>;
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// In-memory store. Clones share the same map, so two stores built from
/// clones of one `MemoryStore` see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once all blobs together would exceed
    /// `bytes`.
    pub fn with_capacity_limit(bytes: usize) -> Self {
        Self {
            blobs: Arc::default(),
            capacity: Some(bytes),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, ScanError> {
        self.blobs
            .lock()
            .map_err(|_| ScanError::Internal("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ScanError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<(), ScanError> {
        let mut blobs = self.lock()?;
        if let Some(limit) = self.capacity {
            let others: usize = blobs
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + blob.len() > limit {
                return Err(ScanError::StorageQuotaExceeded {
                    needed: blob.len(),
                    detail: format!("{} of {} bytes already used", others, limit),
                });
            }
        }
        blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ScanError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ── File-backed ──────────────────────────────────────────────────────────────

/// One JSON file per key inside a directory.
///
/// Writes go to a temp file in the same directory which is then renamed over
/// the target, so readers never observe a half-written blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    max_blob_bytes: Option<usize>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ScanError::StorageFailed {
            key: dir.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            dir,
            max_blob_bytes: None,
        })
    }

    /// Refuse blobs larger than `bytes`.
    pub fn with_max_blob_bytes(mut self, bytes: usize) -> Self {
        self.max_blob_bytes = Some(bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, ScanError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(ScanError::StorageFailed {
                key: key.to_string(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "keys may only contain ASCII letters, digits, '.', '_' and '-'",
                ),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn storage_error(key: &str, needed: usize, e: io::Error) -> ScanError {
    match e.kind() {
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => {
            ScanError::StorageQuotaExceeded {
                needed,
                detail: e.to_string(),
            }
        }
        _ => ScanError::StorageFailed {
            key: key.to_string(),
            source: e,
        },
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ScanError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(key, 0, e)),
        }
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<(), ScanError> {
        let path = self.path_for(key)?;
        if let Some(limit) = self.max_blob_bytes {
            if blob.len() > limit {
                return Err(ScanError::StorageQuotaExceeded {
                    needed: blob.len(),
                    detail: format!("limit is {limit} bytes"),
                });
            }
        }

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| storage_error(key, blob.len(), e))?;
        tmp.write_all(blob)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| storage_error(key, blob.len(), e))?;
        tmp.persist(&path)
            .map_err(|e| storage_error(key, blob.len(), e.error))?;

        debug!("Wrote {} bytes to {}", blob.len(), path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ScanError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(key, 0, e)),
        }
    }
}
