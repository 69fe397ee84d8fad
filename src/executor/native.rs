//! HTTP executor backed by reqwest.
//!
//! Translates a resolved [`Request`] into a reqwest request: enabled query
//! parameters and headers, every body mode, and every auth mode. Transport
//! failures, timeouts and cancellation come back as status-0 responses.

use super::cancellation::CancellationToken;
use super::config::ExecutionConfig;
use super::error::RequestError;
use super::RequestExecutor;
use crate::auth::{self, AuthAttachment};
use crate::models::{AuthConfig, HttpMethod, Request, RequestBody, Response};
use async_trait::async_trait;
use log::{debug, warn};
use std::time::{Duration, Instant};
use url::Url;

/// [`RequestExecutor`] implementation using a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
    config: ExecutionConfig,
}

impl ReqwestExecutor {
    /// Builds an executor whose client honours the redirect and TLS settings.
    pub fn new(config: ExecutionConfig) -> Result<Self, RequestError> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects as usize)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .redirect(redirect)
            .danger_accept_invalid_certs(!config.validate_ssl)
            .build()
            .map_err(|e| RequestError::BuildError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Builds an executor from the global configuration.
    pub fn from_global_config() -> Result<Self, RequestError> {
        Self::new(ExecutionConfig::from_global_config())
    }

    /// Returns the execution settings in use.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    async fn send(&self, request: &Request) -> Result<Response, RequestError> {
        let attachment = match &request.auth {
            AuthConfig::OAuth2ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scope,
            } => {
                debug!("Fetching OAuth2 token from {}", token_url);
                let token = auth::oauth2::fetch_client_credentials_token(
                    &self.client,
                    token_url,
                    client_id,
                    client_secret,
                    scope.as_deref(),
                )
                .await?;
                Some(AuthAttachment::Header {
                    name: "Authorization".to_string(),
                    value: auth::bearer_token(&token),
                })
            }
            other => auth::static_attachment(other),
        };

        let url = build_url(request, attachment.as_ref())?;
        let mut builder = self.client.request(to_reqwest_method(request.method), url);

        let mut sent_headers: Vec<String> = Vec::new();
        for pair in request.enabled_headers() {
            builder = builder.header(pair.key.as_str(), pair.value.as_str());
            sent_headers.push(pair.key.to_ascii_lowercase());
        }
        let has_header = |name: &str| sent_headers.iter().any(|h| h.eq_ignore_ascii_case(name));

        if let Some(AuthAttachment::Header { name, value }) = &attachment {
            if has_header(name) {
                debug!("Request sets '{}' explicitly; skipping auth header", name);
            } else {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        for (name, value) in &self.config.default_headers {
            if !has_header(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        builder = match &request.body {
            RequestBody::None => builder,
            RequestBody::Raw {
                content,
                content_type,
            } => {
                if let Some(content_type) = content_type {
                    if !has_header("content-type") {
                        builder = builder.header("Content-Type", content_type.as_str());
                    }
                }
                builder.body(content.clone())
            }
            RequestBody::Json { content } => {
                if !has_header("content-type") {
                    builder = builder.header("Content-Type", "application/json");
                }
                builder.body(content.clone())
            }
            RequestBody::FormData { fields } => {
                let form = fields
                    .iter()
                    .filter(|f| f.enabled)
                    .fold(reqwest::multipart::Form::new(), |form, f| {
                        form.text(f.key.clone(), f.value.clone())
                    });
                builder.multipart(form)
            }
            RequestBody::UrlEncoded { fields } => {
                let pairs: Vec<(&str, &str)> = fields
                    .iter()
                    .filter(|f| f.enabled)
                    .map(|f| (f.key.as_str(), f.value.as_str()))
                    .collect();
                builder.form(&pairs)
            }
        };

        let http_response = builder.send().await?;

        let status = http_response.status();
        let mut response = Response::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
        );
        for (name, value) in http_response.headers() {
            if let Ok(value) = value.to_str() {
                response.add_header(name.as_str(), value);
            }
        }

        let body = http_response.bytes().await?;
        response.set_body(body.to_vec());
        Ok(response)
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(&self, request: &Request, cancellation: &CancellationToken) -> Response {
        let start = Instant::now();
        if cancellation.is_cancelled() {
            return Response::from_error(RequestError::Cancelled.to_string(), Duration::ZERO);
        }

        let timeout = self.config.timeout_for(request.timeout_ms);
        debug!(
            "{} {} (timeout {}ms)",
            request.method,
            request.url,
            timeout.as_millis()
        );

        let outcome = tokio::select! {
            _ = cancellation.cancelled() => Err(RequestError::Cancelled),
            sent = tokio::time::timeout(timeout, self.send(request)) => match sent {
                Ok(result) => result,
                Err(_) => Err(RequestError::Timeout),
            },
        };

        match outcome {
            Ok(mut response) => {
                response.elapsed = start.elapsed();
                debug!(
                    "{} {} -> {} in {}ms",
                    request.method,
                    request.url,
                    response.status_code,
                    response.elapsed.as_millis()
                );
                response
            }
            Err(err) => {
                warn!("{} {} failed: {}", request.method, request.url, err);
                Response::from_error(err.to_string(), start.elapsed())
            }
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::HEAD => reqwest::Method::HEAD,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        HttpMethod::TRACE => reqwest::Method::TRACE,
    }
}

/// Parses the request URL and appends enabled query parameters (and an
/// API-key query credential, if any) after whatever query it already has.
fn build_url(request: &Request, attachment: Option<&AuthAttachment>) -> Result<Url, RequestError> {
    let mut url = Url::parse(request.url.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(RequestError::UnsupportedProtocol(other.to_string())),
    }

    let mut extra: Vec<(&str, &str)> = request
        .enabled_query_params()
        .map(|p| (p.key.as_str(), p.value.as_str()))
        .collect();
    if let Some(AuthAttachment::Query { name, value }) = attachment {
        extra.push((name.as_str(), value.as_str()));
    }

    if !extra.is_empty() {
        url.query_pairs_mut().extend_pairs(extra);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyValuePair;

    #[test]
    fn test_build_url_appends_enabled_params() {
        let mut request = Request::new("r", HttpMethod::GET, "https://api.test/items?page=1")
            .with_query_param("q", "a b");
        request.query_params.push(KeyValuePair::disabled("off", "x"));

        let url = build_url(&request, None).unwrap();
        assert_eq!(url.as_str(), "https://api.test/items?page=1&q=a+b");
    }

    #[test]
    fn test_build_url_without_params_is_unchanged() {
        let request = Request::new("r", HttpMethod::GET, "http://api.test/items");
        assert_eq!(
            build_url(&request, None).unwrap().as_str(),
            "http://api.test/items"
        );
    }

    #[test]
    fn test_build_url_api_key_query() {
        let request = Request::new("r", HttpMethod::GET, "https://api.test/");
        let attachment = AuthAttachment::Query {
            name: "api_key".to_string(),
            value: "k1".to_string(),
        };
        let url = build_url(&request, Some(&attachment)).unwrap();
        assert_eq!(url.query(), Some("api_key=k1"));
    }

    #[test]
    fn test_build_url_rejects_bad_input() {
        let invalid = Request::new("r", HttpMethod::GET, "not a url");
        assert!(matches!(
            build_url(&invalid, None),
            Err(RequestError::InvalidUrl(_))
        ));

        let ftp = Request::new("r", HttpMethod::GET, "ftp://files.test/x");
        assert!(matches!(
            build_url(&ftp, None),
            Err(RequestError::UnsupportedProtocol(p)) if p == "ftp"
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let executor = ReqwestExecutor::new(ExecutionConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let request = Request::new("r", HttpMethod::GET, "http://127.0.0.1:9/");
        let response = executor.execute(&request, &token).await;
        assert_eq!(response.status_code, 0);
        assert_eq!(response.error.as_deref(), Some("Request cancelled"));
    }

    #[tokio::test]
    async fn test_invalid_url_becomes_error_response() {
        let executor = ReqwestExecutor::new(ExecutionConfig::default()).unwrap();
        let request = Request::new("r", HttpMethod::GET, "{{base}}/x");
        let response = executor
            .execute(&request, &CancellationToken::new())
            .await;
        assert_eq!(response.status_code, 0);
        assert!(response.error.unwrap().starts_with("Invalid URL"));
    }
}
