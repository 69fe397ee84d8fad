//! Data models for HTTP requests and responses.
//!
//! This module contains the core value types that flow through the request
//! execution pipeline.

pub mod request;
pub mod response;

pub use request::{ApiKeyLocation, AuthConfig, HttpMethod, KeyValuePair, Request, RequestBody};
pub use response::Response;
