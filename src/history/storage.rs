//! In-memory history storage.
//!
//! Entries are kept oldest-first and trimmed to the configured limit on every
//! append.

use super::models::{HistoryEntry, HistoryError};
use super::HistoryRepository;
use crate::config::get_config;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Default maximum number of history entries to keep.
pub const DEFAULT_MAX_HISTORY_ENTRIES: usize = 1000;

/// Bounded, thread-safe history.
///
/// Entries are sanitized (credentials removed, oversized bodies dropped)
/// before they are stored.
#[derive(Debug)]
pub struct InMemoryHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    max_entries: usize,
}

impl InMemoryHistory {
    /// Creates an empty history holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Creates a history bounded by the global `historyLimit` setting.
    pub fn from_global_config() -> Self {
        Self::new(get_config().history_limit)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<HistoryEntry>>, HistoryError> {
        self.entries
            .lock()
            .map_err(|e| HistoryError::LockError(e.to_string()))
    }

    pub fn len(&self) -> Result<usize, HistoryError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, HistoryError> {
        Ok(self.lock()?.is_empty())
    }

    /// Removes every entry.
    pub fn clear(&self) -> Result<(), HistoryError> {
        self.lock()?.clear();
        Ok(())
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_ENTRIES)
    }
}

impl HistoryRepository for InMemoryHistory {
    fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let mut entries = self.lock()?;
        entries.push_back(entry.prepare_for_storage());
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self.lock()?.iter().cloned().collect())
    }
}
