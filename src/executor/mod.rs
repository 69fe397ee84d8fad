//! HTTP request executor.
//!
//! The pipeline only talks to the network through the [`RequestExecutor`]
//! trait. [`ReqwestExecutor`] is the production implementation; tests swap in
//! stubs. An executor never fails: anything that prevents a real HTTP
//! response (timeouts, refused connections, cancellation) is reported as a
//! status-0 [`Response`] with `error` set.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod native;

pub use cancellation::{
    CancelError, CancellationToken, RequestHandle, RequestTracker, SharedRequestTracker,
};
pub use config::ExecutionConfig;
pub use error::RequestError;
pub use native::ReqwestExecutor;

use crate::models::{Request, Response};
use async_trait::async_trait;

/// Sends a fully resolved request.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Executes `request`, honouring its `timeout_ms` and the cancellation token.
    ///
    /// # Returns
    ///
    /// Always a `Response`; transport failures are encoded with status code 0.
    async fn execute(&self, request: &Request, cancellation: &CancellationToken) -> Response;
}
