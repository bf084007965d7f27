//! Durable storage for Observation buffers.
//!
//! The hub talks to storage through [`BackupStore`], one blob per
//! Observation. [`FileBackupStore`] keeps one file per Observation in a
//! directory and replaces files atomically; [`MemoryBackupStore`] keeps
//! blobs in memory for tests and diskless setups.

pub mod codec;

use crate::error::{HubError, Result, ResultExt};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Named blob storage for serialized buffers.
#[cfg_attr(test, mockall::automock)]
pub trait BackupStore: Send {
    /// Atomically replace the blob stored under `name`.
    fn write(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Read a blob back. `Ok(None)` if nothing is stored under `name`.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob. Removing a missing blob is not an error.
    fn remove(&mut self, name: &str) -> Result<()>;

    /// Names of every stored blob.
    fn list(&self) -> Result<Vec<String>>;
}

/// One file per Observation in a directory.
#[derive(Debug)]
pub struct FileBackupStore {
    dir: PathBuf,
}

impl FileBackupStore {
    /// Open (creating if needed) a backup directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create backup directory {}", dir.display()))?;
        Ok(Self { dir })
    }
}

impl BackupStore for FileBackupStore {
    fn write(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let target = self.dir.join(name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .context("Failed to create temporary backup file")?;
        tmp.write_all(data)
            .context("Failed to write backup")?;
        tmp.as_file()
            .sync_all()
            .context("Failed to sync backup")?;
        tmp.persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to commit backup {}", target.display()))?;
        debug!("Wrote {} bytes to {}", data.len(), target.display());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HubError::Io(e).with_context(format!("Failed to read backup {}", path.display()))),
        }
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HubError::Io(e).with_context(format!("Failed to remove backup {}", path.display()))),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry.context("Failed to list backup directory")?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            // Uncommitted temporary files start with '.'; backup names never do.
            if let Some(name) = entry.file_name().to_str().filter(|n| !n.starts_with('.')) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackupStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().get(name).cloned()
    }

    pub fn insert(&self, name: &str, data: Vec<u8>) {
        self.lock().insert(name.to_string(), data);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BackupStore for MemoryBackupStore {
    fn write(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.insert(name, data.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(name))
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        self.lock().remove(name);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<_> = self.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
