//! Cancellation tokens and in-flight request tracking.
//!
//! A `CancellationToken` is shared by every stage of one orchestration: the
//! script sandbox polls it from the engine's interrupt handler, and the HTTP
//! executor races it against the network call. The `RequestTracker` keeps a
//! registry of running orchestrations so callers can cancel one by ID or
//! cancel the most recent one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation signal.
///
/// Cancelling any clone cancels all of them. Checking the flag is a single
/// atomic load, so it is cheap enough to poll from the script interrupt
/// handler.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation and wakes every task waiting in [`cancelled`](Self::cancelled).
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Checks if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // cancel() cannot slip between the check and the await.
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// A handle to a running request that can be cancelled.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    /// Unique identifier for this request.
    pub request_id: String,

    /// Token observed by the pipeline running this request.
    pub token: CancellationToken,
}

impl RequestHandle {
    /// Creates a new request handle with a generated UUID.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Creates a new request handle with a specific request ID.
    pub fn with_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            token: CancellationToken::new(),
        }
    }

    /// Checks if cancellation has been requested for this request.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Marks this request as cancelled.
    pub fn mark_cancelled(&self) {
        self.token.cancel();
    }
}

impl Default for RequestHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Error types for cancellation operations.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelError {
    /// Request with the given ID was not found.
    NotFound(String),

    /// Failed to acquire lock on tracker.
    LockError(String),
}

impl std::fmt::Display for CancelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelError::NotFound(id) => write!(f, "Request not found: {}", id),
            CancelError::LockError(msg) => write!(f, "Lock error: {}", msg),
        }
    }
}

impl std::error::Error for CancelError {}

/// Tracks active requests and manages cancellation.
#[derive(Debug, Default)]
pub struct RequestTracker {
    /// Map of request IDs to their handles.
    active_requests: HashMap<String, RequestHandle>,

    /// Order of request IDs by insertion time (oldest first).
    request_order: Vec<String>,
}

impl RequestTracker {
    /// Creates a new empty request tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request for tracking and returns its ID.
    pub fn register(&mut self, handle: RequestHandle) -> String {
        let request_id = handle.request_id.clone();
        self.request_order.push(request_id.clone());
        self.active_requests.insert(request_id.clone(), handle);
        request_id
    }

    /// Removes a request from tracking (called when request completes).
    ///
    /// # Returns
    ///
    /// `true` if the request was found and removed, `false` otherwise.
    pub fn unregister(&mut self, request_id: &str) -> bool {
        if let Some(pos) = self.request_order.iter().position(|id| id == request_id) {
            self.request_order.remove(pos);
        }
        self.active_requests.remove(request_id).is_some()
    }

    /// Cancels a specific request by ID and stops tracking it.
    pub fn cancel_request(&mut self, request_id: &str) -> Result<(), CancelError> {
        let handle = self
            .active_requests
            .get(request_id)
            .ok_or_else(|| CancelError::NotFound(request_id.to_string()))?;

        handle.mark_cancelled();
        self.unregister(request_id);
        Ok(())
    }

    /// Cancels the most recently started request.
    ///
    /// # Returns
    ///
    /// `Ok(request_id)` if a request was cancelled, or `Err(CancelError::NotFound)`
    /// if there are no active requests.
    pub fn cancel_most_recent(&mut self) -> Result<String, CancelError> {
        let request_id = self
            .request_order
            .last()
            .ok_or_else(|| CancelError::NotFound("no active requests".to_string()))?
            .clone();

        self.cancel_request(&request_id)?;
        Ok(request_id)
    }

    /// Gets the number of active requests currently being tracked.
    pub fn active_count(&self) -> usize {
        self.active_requests.len()
    }

    /// Gets a list of all active request IDs, oldest first.
    pub fn active_request_ids(&self) -> Vec<String> {
        self.request_order.clone()
    }

    /// Checks if a specific request is still active.
    pub fn is_active(&self, request_id: &str) -> bool {
        self.active_requests.contains_key(request_id)
    }
}

/// Thread-safe wrapper around RequestTracker.
#[derive(Debug, Clone, Default)]
pub struct SharedRequestTracker {
    inner: Arc<Mutex<RequestTracker>>,
}

impl SharedRequestTracker {
    /// Creates a new shared request tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RequestTracker>, CancelError> {
        self.inner
            .lock()
            .map_err(|e| CancelError::LockError(e.to_string()))
    }

    /// Registers a new request for tracking.
    pub fn register(&self, handle: RequestHandle) -> Result<String, CancelError> {
        Ok(self.lock()?.register(handle))
    }

    /// Removes a request from tracking.
    pub fn unregister(&self, request_id: &str) -> Result<bool, CancelError> {
        Ok(self.lock()?.unregister(request_id))
    }

    /// Cancels a specific request.
    pub fn cancel_request(&self, request_id: &str) -> Result<(), CancelError> {
        self.lock()?.cancel_request(request_id)
    }

    /// Cancels the most recent request.
    pub fn cancel_most_recent(&self) -> Result<String, CancelError> {
        self.lock()?.cancel_most_recent()
    }

    /// Gets the count of active requests.
    pub fn active_count(&self) -> Result<usize, CancelError> {
        Ok(self.lock()?.active_count())
    }

    /// Gets all active request IDs.
    pub fn active_request_ids(&self) -> Result<Vec<String>, CancelError> {
        Ok(self.lock()?.active_request_ids())
    }

    /// Checks if a request is active.
    pub fn is_active(&self, request_id: &str) -> Result<bool, CancelError> {
        Ok(self.lock()?.is_active(request_id))
    }
}
