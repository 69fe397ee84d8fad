//! HTTP request data models.
//!
//! This module defines the core data structures for representing HTTP requests,
//! including the request method, header and query pairs, body, and auth descriptor.
//! A `Request` is treated as an immutable value: variable resolution produces a
//! new `Request` rather than mutating the original.

use serde::{Deserialize, Serialize};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// HTTP GET method - retrieve a resource
    GET,
    /// HTTP POST method - submit data to create a resource
    POST,
    /// HTTP PUT method - replace a resource
    PUT,
    /// HTTP PATCH method - partially modify a resource
    PATCH,
    /// HTTP DELETE method - remove a resource
    DELETE,
    /// HTTP HEAD method - retrieve headers only
    HEAD,
    /// HTTP OPTIONS method - describe communication options
    OPTIONS,
    /// HTTP TRACE method - perform a message loop-back test
    TRACE,
}

impl HttpMethod {
    /// Returns the string representation of the HTTP method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::TRACE => "TRACE",
        }
    }

    /// Parses a string into an HttpMethod.
    ///
    /// # Returns
    ///
    /// `Some(HttpMethod)` if the string is a valid HTTP method, `None` otherwise.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "TRACE" => Some(HttpMethod::TRACE),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single header or query parameter.
///
/// Keys are not required to be unique. A disabled pair stays in the model but
/// is skipped by variable resolution and never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl KeyValuePair {
    /// Creates an enabled pair.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates a disabled pair.
    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: false,
        }
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RequestBody {
    /// No body is sent.
    #[default]
    None,
    /// Raw text body with an optional explicit content type.
    Raw {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    /// JSON text body, sent as `application/json`.
    Json { content: String },
    /// `multipart/form-data` fields.
    FormData { fields: Vec<KeyValuePair> },
    /// `application/x-www-form-urlencoded` fields.
    UrlEncoded { fields: Vec<KeyValuePair> },
}

impl RequestBody {
    /// Name of the body mode as exposed to scripts.
    pub fn mode(&self) -> &'static str {
        match self {
            RequestBody::None => "none",
            RequestBody::Raw { .. } => "raw",
            RequestBody::Json { .. } => "json",
            RequestBody::FormData { .. } => "formdata",
            RequestBody::UrlEncoded { .. } => "urlencoded",
        }
    }

    /// Returns true if no body is attached.
    pub fn is_none(&self) -> bool {
        matches!(self, RequestBody::None)
    }

    /// Renders the body as text, the way it is summarised to scripts.
    ///
    /// Field-based bodies render their enabled fields as `key=value` lines
    /// joined with `&`.
    pub fn raw_content(&self) -> Option<String> {
        match self {
            RequestBody::None => None,
            RequestBody::Raw { content, .. } | RequestBody::Json { content } => {
                Some(content.clone())
            }
            RequestBody::FormData { fields } | RequestBody::UrlEncoded { fields } => Some(
                fields
                    .iter()
                    .filter(|f| f.enabled)
                    .map(|f| format!("{}={}", f.key, f.value))
                    .collect::<Vec<_>>()
                    .join("&"),
            ),
        }
    }
}

/// Where an API key is attached to the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// Authentication descriptor attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    ApiKey {
        key: String,
        value: String,
        #[serde(default)]
        location: ApiKeyLocation,
    },
    #[serde(rename = "oauth2_client_credentials")]
    OAuth2ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
}

/// An HTTP request as authored by the user.
///
/// The URL, headers, query parameters and body may contain `{{variable}}`
/// templates that are resolved before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier for tracking this request.
    pub id: String,

    /// Display name of the request.
    #[serde(default)]
    pub name: String,

    /// HTTP method.
    pub method: HttpMethod,

    /// Target URL, possibly containing templates.
    pub url: String,

    /// Ordered header pairs.
    #[serde(default)]
    pub headers: Vec<KeyValuePair>,

    /// Ordered query parameter pairs, appended to the URL at execution time.
    #[serde(default)]
    pub query_params: Vec<KeyValuePair>,

    #[serde(default)]
    pub body: RequestBody,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Script run before the request is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request_script: Option<String>,

    /// Script run after the response arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_response_script: Option<String>,

    /// Per-request timeout in milliseconds. Zero means the executor default.
    #[serde(default)]
    pub timeout_ms: u64,
}

impl Request {
    /// Creates a new Request with default values for optional fields.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier for the request
    /// * `method` - HTTP method
    /// * `url` - Target URL
    pub fn new(id: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            method,
            url: url.into(),
            headers: Vec::new(),
            query_params: Vec::new(),
            body: RequestBody::None,
            auth: AuthConfig::None,
            pre_request_script: None,
            post_response_script: None,
            timeout_ms: 0,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends an enabled header pair.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValuePair::new(key, value));
        self
    }

    /// Appends an enabled query parameter pair.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(KeyValuePair::new(key, value));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_pre_request_script(mut self, script: impl Into<String>) -> Self {
        self.pre_request_script = Some(script.into());
        self
    }

    pub fn with_post_response_script(mut self, script: impl Into<String>) -> Self {
        self.post_response_script = Some(script.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Iterates over the headers that will actually be sent.
    pub fn enabled_headers(&self) -> impl Iterator<Item = &KeyValuePair> {
        self.headers.iter().filter(|h| h.enabled)
    }

    /// Iterates over the query parameters that will actually be sent.
    pub fn enabled_query_params(&self) -> impl Iterator<Item = &KeyValuePair> {
        self.query_params.iter().filter(|q| q.enabled)
    }

    /// Gets the first enabled Content-Type header value if present.
    pub fn content_type(&self) -> Option<&str> {
        self.enabled_headers()
            .find(|h| h.key.eq_ignore_ascii_case("content-type"))
            .map(|h| h.value.as_str())
    }

    /// Returns true if either script slot holds non-blank text.
    pub fn has_scripts(&self) -> bool {
        [&self.pre_request_script, &self.post_response_script]
            .iter()
            .any(|s| s.as_deref().map_or(false, |s| !s.trim().is_empty()))
    }
}
