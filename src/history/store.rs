//! The history store.

use crate::error::WarrickError;
use crate::history::entry::GeneratedImage;
use crate::history::storage::HistoryStorage;
use std::collections::HashSet;

/// Maximum number of entries kept.
pub const MAX_HISTORY: usize = 15;

/// Newest-first list of generated images, persisted on every mutation.
///
/// Persistence never fails a caller. If a write is rejected (typically the
/// slot is full), the store halves what it keeps and writes again, down to
/// the newest entry. That entry is kept in memory even if it cannot be
/// written.
#[derive(Debug)]
pub struct HistoryStore<S> {
    storage: S,
    entries: Vec<GeneratedImage>,
}

impl<S: HistoryStorage> HistoryStore<S> {
    /// Restores history from `storage`.
    ///
    /// Unreadable or corrupt contents are discarded with a warning.
    pub fn load(storage: S) -> Self {
        let entries = match storage.read() {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<GeneratedImage>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("discarding unreadable history: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read history: {e}");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let mut entries: Vec<_> = entries
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        entries.truncate(MAX_HISTORY);

        Self { storage, entries }
    }

    /// Adds `entry` as the newest item and persists.
    ///
    /// An existing entry with the same id is replaced.
    pub fn prepend(&mut self, entry: GeneratedImage) {
        self.entries.retain(|e| e.id != entry.id);
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY);
        self.persist();
    }

    /// Removes every entry and persists the empty list.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[GeneratedImage] {
        &self.entries
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: &str) -> Option<&GeneratedImage> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The newest entry.
    pub fn latest(&self) -> Option<&GeneratedImage> {
        self.entries.first()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries kept.
    pub fn capacity(&self) -> usize {
        MAX_HISTORY
    }

    fn persist(&mut self) {
        loop {
            let result = serde_json::to_string(&self.entries)
                .map_err(WarrickError::from)
                .and_then(|json| self.storage.write(&json));

            let Err(e) = result else {
                return;
            };

            if self.entries.len() <= 1 {
                tracing::warn!(
                    entries = self.entries.len(),
                    "history not persisted, keeping it in memory: {e}"
                );
                return;
            }
            let keep = (self.entries.len() / 2).max(1);
            tracing::warn!(
                from = self.entries.len(),
                to = keep,
                "history write failed, shrinking: {e}"
            );
            self.entries.truncate(keep);
        }
    }
}
