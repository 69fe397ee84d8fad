//! Search functionality for request history.
//!
//! Filters operate on snapshots returned by
//! [`HistoryRepository::entries`](super::HistoryRepository::entries) and keep
//! the input order.

use super::models::HistoryEntry;

/// Searches history entries using case-insensitive substring matching.
///
/// Searches the request URL, name and method, the request body, and the
/// response body when it was stored.
pub fn search_history(query: &str, entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    if query.is_empty() {
        return entries.to_vec();
    }

    let query_lower = query.to_lowercase();

    entries
        .iter()
        .filter(|entry| matches_query(entry, &query_lower))
        .cloned()
        .collect()
}

fn matches_query(entry: &HistoryEntry, query_lower: &str) -> bool {
    let request = &entry.request;
    if request.url.to_lowercase().contains(query_lower)
        || request.name.to_lowercase().contains(query_lower)
        || request.method.as_str().to_lowercase().contains(query_lower)
    {
        return true;
    }

    if let Some(body) = request.body.raw_content() {
        if body.to_lowercase().contains(query_lower) {
            return true;
        }
    }

    entry
        .response
        .as_ref()
        .and_then(|r| r.text.as_deref())
        .map(|text| text.to_lowercase().contains(query_lower))
        .unwrap_or(false)
}

/// Filters history entries by HTTP method (case-insensitive).
pub fn filter_by_method(method: &str, entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let method_upper = method.to_uppercase();
    entries
        .iter()
        .filter(|entry| entry.request.method.as_str() == method_upper)
        .cloned()
        .collect()
}

/// Filters history entries by response status code.
pub fn filter_by_status(status_code: u16, entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    entries
        .iter()
        .filter(|entry| entry.status_code() == Some(status_code))
        .cloned()
        .collect()
}

/// Entries with a failed test, a script error, a transport error or a
/// 4xx/5xx status.
pub fn filter_failures(entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    entries
        .iter()
        .filter(|entry| {
            entry.tests_failed > 0
                || entry.script_errors > 0
                || entry.response.as_ref().map_or(true, |r| {
                    r.is_error() || r.is_client_error() || r.is_server_error()
                })
        })
        .cloned()
        .collect()
}

/// The `count` newest entries, newest first.
pub fn get_recent_entries(count: usize, entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.truncate(count);
    sorted
}
