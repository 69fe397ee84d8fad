//! Data models for request history.
//!
//! A history entry records one completed orchestration: the resolved request
//! that was sent, the response that came back, and a summary of the script
//! outcome.

use crate::models::{AuthConfig, Request, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Maximum response body size to store in history (1MB).
///
/// Responses larger than this threshold will have their body excluded
/// to prevent excessive storage usage.
pub const MAX_RESPONSE_BODY_SIZE: usize = 1_048_576; // 1MB

/// Sensitive header names that are removed before storage.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
    "auth-token",
    "x-auth-token",
    "access-token",
    "x-access-token",
    "proxy-authorization",
];

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| name.eq_ignore_ascii_case(sensitive))
}

/// A single entry in the request history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// When the orchestration finished, in UTC.
    pub timestamp: DateTime<Utc>,

    /// The request after variable resolution.
    pub request: Request,

    /// `None` when the pipeline stopped before the HTTP call.
    pub response: Option<Response>,

    pub tests_passed: usize,
    pub tests_failed: usize,
    pub script_errors: usize,
    pub cancelled: bool,

    /// Total pipeline time.
    pub duration: Duration,
}

impl HistoryEntry {
    /// Creates a new entry with a fresh id and the current timestamp.
    pub fn new(request: Request, response: Option<Response>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            request,
            response,
            tests_passed: 0,
            tests_failed: 0,
            script_errors: 0,
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    /// Records the script outcome summary.
    pub fn with_outcome(
        mut self,
        tests_passed: usize,
        tests_failed: usize,
        script_errors: usize,
        cancelled: bool,
    ) -> Self {
        self.tests_passed = tests_passed;
        self.tests_failed = tests_failed;
        self.script_errors = script_errors;
        self.cancelled = cancelled;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Status code of the stored response, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        self.response
            .as_ref()
            .map(|r| r.status_code)
            .filter(|code| *code != 0)
    }

    /// Checks if the response body exceeds the storage limit.
    pub fn has_large_response(&self) -> bool {
        self.response
            .as_ref()
            .map(|r| r.body.len() > MAX_RESPONSE_BODY_SIZE)
            .unwrap_or(false)
    }

    /// Removes credentials: sensitive headers on both sides and the auth
    /// descriptor.
    pub fn sanitize(&self) -> Self {
        let mut entry = self.clone();
        entry.request.headers.retain(|pair| !is_sensitive(&pair.key));
        entry.request.auth = AuthConfig::None;
        if let Some(response) = entry.response.as_mut() {
            response.headers.retain(|(name, _)| !is_sensitive(name));
        }
        entry
    }

    /// Drops the response body if it exceeds [`MAX_RESPONSE_BODY_SIZE`].
    pub fn truncate_large_response(&self) -> Self {
        if !self.has_large_response() {
            return self.clone();
        }

        let mut entry = self.clone();
        if let Some(response) = entry.response.as_mut() {
            response.body = Vec::new();
            response.text = None;
        }
        entry
    }

    /// Prepares the entry for storage by sanitizing and truncating as needed.
    pub fn prepare_for_storage(&self) -> Self {
        self.sanitize().truncate_large_response()
    }
}

/// Errors that can occur during history operations.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryError {
    /// The history lock was poisoned.
    LockError(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::LockError(msg) => write!(f, "History lock error: {}", msg),
        }
    }
}

impl std::error::Error for HistoryError {}
