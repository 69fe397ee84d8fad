//! HTTP authentication module.
//!
//! Turns a request's [`AuthConfig`] into what actually goes on the wire: an
//! `Authorization` header, an API-key header, or an API-key query parameter.
//! OAuth2 client credentials need a network round-trip and are handled by
//! [`oauth2::fetch_client_credentials_token`].

pub mod basic;
pub mod oauth2;

use crate::models::{ApiKeyLocation, AuthConfig};
use std::fmt;

/// Errors that can occur while obtaining credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token endpoint could not be reached or rejected the request.
    TokenRequest(String),
    /// The token endpoint answered with something that is not a token.
    InvalidTokenResponse(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::TokenRequest(msg) => write!(f, "Token request failed: {}", msg),
            AuthError::InvalidTokenResponse(msg) => {
                write!(f, "Invalid token response: {}", msg)
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// A credential ready to be attached to an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAttachment {
    Header { name: String, value: String },
    Query { name: String, value: String },
}

/// Formats a token into a Bearer authentication header value.
///
/// # Examples
///
/// ```
/// use rest_runner::auth::bearer_token;
///
/// assert_eq!(bearer_token("abc123xyz"), "Bearer abc123xyz");
/// ```
pub fn bearer_token(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Builds the attachment for auth schemes that need no network access.
///
/// # Returns
///
/// `None` for `AuthConfig::None` and for OAuth2, whose token must be fetched first.
pub fn static_attachment(auth: &AuthConfig) -> Option<AuthAttachment> {
    match auth {
        AuthConfig::None | AuthConfig::OAuth2ClientCredentials { .. } => None,
        AuthConfig::Basic { username, password } => Some(AuthAttachment::Header {
            name: "Authorization".to_string(),
            value: basic::basic_auth(username, password),
        }),
        AuthConfig::Bearer { token } => Some(AuthAttachment::Header {
            name: "Authorization".to_string(),
            value: bearer_token(token),
        }),
        AuthConfig::ApiKey {
            key,
            value,
            location,
        } => Some(match location {
            ApiKeyLocation::Header => AuthAttachment::Header {
                name: key.clone(),
                value: value.clone(),
            },
            ApiKeyLocation::Query => AuthAttachment::Query {
                name: key.clone(),
                value: value.clone(),
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_attachment() {
        let auth = AuthConfig::Basic {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(
            static_attachment(&auth),
            Some(AuthAttachment::Header {
                name: "Authorization".to_string(),
                value: "Basic dXNlcjpwYXNz".to_string(),
            })
        );
    }

    #[test]
    fn test_bearer_attachment() {
        let auth = AuthConfig::Bearer {
            token: "abc".to_string(),
        };
        assert_eq!(
            static_attachment(&auth),
            Some(AuthAttachment::Header {
                name: "Authorization".to_string(),
                value: "Bearer abc".to_string(),
            })
        );
    }

    #[test]
    fn test_api_key_locations() {
        let header = AuthConfig::ApiKey {
            key: "X-API-Key".to_string(),
            value: "k".to_string(),
            location: ApiKeyLocation::Header,
        };
        let query = AuthConfig::ApiKey {
            key: "api_key".to_string(),
            value: "k".to_string(),
            location: ApiKeyLocation::Query,
        };
        assert!(matches!(
            static_attachment(&header),
            Some(AuthAttachment::Header { name, .. }) if name == "X-API-Key"
        ));
        assert!(matches!(
            static_attachment(&query),
            Some(AuthAttachment::Query { name, .. }) if name == "api_key"
        ));
    }

    #[test]
    fn test_no_static_attachment() {
        assert_eq!(static_attachment(&AuthConfig::None), None);
        let oauth = AuthConfig::OAuth2ClientCredentials {
            token_url: "https://auth".to_string(),
            client_id: "id".to_string(),
            client_secret: "s".to_string(),
            scope: None,
        };
        assert_eq!(static_attachment(&oauth), None);
    }

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthError::TokenRequest("boom".to_string()).to_string(),
            "Token request failed: boom"
        );
    }
}
