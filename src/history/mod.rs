//! Request history.
//!
//! Completed orchestrations can be recorded through a [`HistoryRepository`].
//! [`InMemoryHistory`] is the bundled implementation; it is bounded by the
//! `historyLimit` setting and strips credentials before storing an entry.
//!
//! # Example
//!
//! ```
//! use rest_runner::history::{HistoryEntry, HistoryRepository, InMemoryHistory};
//! use rest_runner::models::{HttpMethod, Request};
//!
//! let history = InMemoryHistory::new(100);
//! let request = Request::new("r1", HttpMethod::GET, "https://api.example.com/users");
//! history.append(HistoryEntry::new(request, None)).unwrap();
//! assert_eq!(history.entries().unwrap().len(), 1);
//! ```

pub mod models;
pub mod search;
pub mod storage;

pub use models::{HistoryEntry, HistoryError};
pub use search::{
    filter_by_method, filter_by_status, filter_failures, get_recent_entries, search_history,
};
pub use storage::InMemoryHistory;

/// Append-only store of past orchestrations.
pub trait HistoryRepository: Send + Sync {
    /// Records an entry.
    fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// Returns a snapshot of all stored entries, oldest first.
    fn entries(&self) -> Result<Vec<HistoryEntry>, HistoryError>;
}
