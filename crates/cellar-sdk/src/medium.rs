//! Persistence media: durable key-value homes for the snapshot blobs.
//!
//! A cellar persists as two opaque text blobs, the store registry and the
//! cell registry. A [`Medium`] only has to keep them across restarts; it
//! never interprets them and never decides when to write.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::RwLock;

use tracing::debug;

use crate::error::MediumError;

/// Durable key-value storage for snapshot blobs.
pub trait Medium: Send + Sync {
    /// Read the blob stored under `key`. Returns `Ok(None)` if absent.
    fn load(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// Store `blob` under `key`, replacing any previous blob.
    fn store(&self, key: &str, blob: &str) -> Result<(), MediumError>;

    /// Store several blobs that are only meaningful together.
    ///
    /// Every blob is staged before any is committed, so a failure while
    /// staging leaves all previous blobs in place.
    fn store_all(&self, blobs: &[(&str, &str)]) -> Result<(), MediumError>;
}

/// A medium that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryMedium {
    blobs: RwLock<HashMap<String, String>>,
}

impl InMemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Medium for InMemoryMedium {
    fn load(&self, key: &str) -> Result<Option<String>, MediumError> {
        let blobs = self.blobs.read().expect("lock poisoned");
        Ok(blobs.get(key).cloned())
    }

    fn store(&self, key: &str, blob: &str) -> Result<(), MediumError> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn store_all(&self, entries: &[(&str, &str)]) -> Result<(), MediumError> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        for (key, blob) in entries {
            blobs.insert(key.to_string(), blob.to_string());
        }
        Ok(())
    }
}

/// A medium storing one file per key inside a directory.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so a crash never leaves a torn blob behind.
#[derive(Clone, Debug)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Use `dir` as the medium root. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediumError> {
        let plain = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\']);
        if !plain {
            return Err(MediumError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl Medium for FileMedium {
    fn load(&self, key: &str) -> Result<Option<String>, MediumError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, blob: &str) -> Result<(), MediumError> {
        self.store_all(&[(key, blob)])
    }

    fn store_all(&self, blobs: &[(&str, &str)]) -> Result<(), MediumError> {
        let targets = blobs
            .iter()
            .map(|(key, _)| self.path_for(key))
            .collect::<Result<Vec<_>, _>>()?;
        fs::create_dir_all(&self.dir)?;

        let mut staged = Vec::with_capacity(blobs.len());
        for (_, blob) in blobs {
            staged.push(self.stage(blob)?);
        }

        for ((tmp, path), (_, blob)) in staged.into_iter().zip(targets).zip(blobs) {
            tmp.persist(&path).map_err(|e| MediumError::Io(e.error))?;
            debug!(path = %path.display(), bytes = blob.len(), "blob persisted");
        }
        Ok(())
    }
}

impl FileMedium {
    /// Write `blob` to a synced temporary file next to its target.
    fn stage(&self, blob: &str) -> Result<tempfile::NamedTempFile, MediumError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(blob.as_bytes())?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}
