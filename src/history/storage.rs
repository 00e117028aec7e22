//! Storage slots for the serialized history.

use crate::error::{Result, WarrickError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Environment variable overriding the history file location.
pub const HISTORY_PATH_ENV: &str = "WARRICK_HISTORY_PATH";

/// A single named slot holding the serialized history.
///
/// Writes are synchronous: when `write` returns `Ok`, the slot holds exactly
/// `contents`.
pub trait HistoryStorage: Send {
    /// Returns the slot contents, or `None` if nothing was ever written.
    fn read(&self) -> Result<Option<String>>;

    /// Replaces the slot contents.
    fn write(&self, contents: &str) -> Result<()>;
}

impl<T: HistoryStorage + ?Sized> HistoryStorage for Box<T> {
    fn read(&self) -> Result<Option<String>> {
        (**self).read()
    }

    fn write(&self, contents: &str) -> Result<()> {
        (**self).write(contents)
    }
}

/// History kept in a JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Uses the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses `$WARRICK_HISTORY_PATH`, else `<data dir>/warrick/history.json`.
    pub fn from_env() -> Self {
        Self::new(Self::default_path())
    }

    /// Resolves the default history file location.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(HISTORY_PATH_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::data_dir()
            .map(|dir| dir.join("warrick").join("history.json"))
            .unwrap_or_else(|| PathBuf::from("warrick_history.json"))
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStorage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory slot. Clones share the same slot.
///
/// An optional byte quota makes oversized writes fail, the way browser
/// storage does when it runs out of room.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Creates an empty, unbounded slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty slot that rejects writes larger than `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            slot: Arc::default(),
            quota: Some(bytes),
        }
    }

    /// Creates a slot pre-filled with `contents`.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        let storage = Self::new();
        *storage.lock() = Some(contents.into());
        storage
    }

    /// Returns the current slot contents.
    pub fn contents(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HistoryStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(quota) = self.quota {
            if contents.len() > quota {
                return Err(WarrickError::Io(std::io::Error::other(format!(
                    "storage quota exceeded ({} > {} bytes)",
                    contents.len(),
                    quota
                ))));
            }
        }
        *self.lock() = Some(contents.to_string());
        Ok(())
    }
}
