//! HTTP response data models.
//!
//! A `Response` is always produced by the request executor, even when the
//! request never reached a server: transport failures and timeouts are encoded
//! as status code 0 with `error` populated.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Represents an HTTP response (or the failure to obtain one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code (e.g., 200, 404, 500). Zero when no response arrived.
    pub status_code: u16,

    /// HTTP status text (e.g., "OK", "Not Found").
    pub status_text: String,

    /// Response header pairs in the order they were received.
    ///
    /// Header names may repeat (e.g. `Set-Cookie`).
    pub headers: Vec<(String, String)>,

    /// Response body as raw bytes.
    pub body: Vec<u8>,

    /// Body decoded as UTF-8, when it is valid text.
    pub text: Option<String>,

    /// Wall-clock time from sending the request to receiving the full body.
    pub elapsed: Duration,

    /// Total response size in bytes (headers + body).
    pub size: usize,

    /// Value of the Content-Type header, if any.
    pub content_type: Option<String>,

    /// Transport-level error message (timeout, connection refused, ...).
    pub error: Option<String>,
}

impl Response {
    /// Creates a new Response with the given status code and text.
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: Vec::new(),
            text: None,
            elapsed: Duration::from_secs(0),
            size: 0,
            content_type: None,
            error: None,
        }
    }

    /// Creates a status-0 response carrying a transport error.
    ///
    /// # Arguments
    ///
    /// * `message` - Human-readable description of the failure
    /// * `elapsed` - Time spent before the failure was detected
    pub fn from_error(message: impl Into<String>, elapsed: Duration) -> Self {
        let mut response = Self::new(0, "Error");
        response.error = Some(message.into());
        response.elapsed = elapsed;
        response
    }

    /// Checks if the response status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Checks if the response status indicates a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Checks if the response status indicates a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }

    /// Checks if the response status indicates a redirection (3xx).
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Returns true when no HTTP response was obtained.
    pub fn is_error(&self) -> bool {
        self.status_code == 0 || self.error.is_some()
    }

    /// Gets the first header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Adds a header to the response, keeping `content_type` in sync.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.clone());
        }
        self.headers.push((name, value));
        self.size = self.calculate_headers_size() + self.body.len();
    }

    /// Sets the response body, decoding it as text when possible.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.text = String::from_utf8(body.clone()).ok();
        self.size = self.calculate_headers_size() + body.len();
        self.body = body;
    }

    /// Attempts to parse the body as JSON.
    ///
    /// # Returns
    ///
    /// `None` if the body is not text or not valid JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.text
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok())
    }

    /// Calculates the approximate size of headers in bytes.
    fn calculate_headers_size(&self) -> usize {
        self.headers
            .iter()
            .map(|(k, v)| k.len() + v.len() + 4) // +4 for ": " and "\r\n"
            .sum()
    }
}
