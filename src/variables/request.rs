//! Request-level variable resolution.
//!
//! Applies [`resolve`] to every templated field of a [`Request`], producing a
//! new request. The auth descriptor is deliberately left untouched by
//! [`resolve_request`]; callers that want templates expanded inside
//! credentials opt in through [`resolve_auth`].

use super::substitution::{resolve, MissingVariablePolicy, VarError, VariableContext};
use crate::models::{AuthConfig, KeyValuePair, Request, RequestBody};

/// Resolves key and value of every enabled pair.
///
/// Order and `enabled` flags are preserved; disabled pairs are copied through
/// without resolution.
pub fn resolve_key_value_pairs(
    pairs: &[KeyValuePair],
    context: &VariableContext,
    policy: MissingVariablePolicy,
) -> Result<Vec<KeyValuePair>, VarError> {
    pairs
        .iter()
        .map(|pair| {
            if !pair.enabled {
                return Ok(pair.clone());
            }
            Ok(KeyValuePair {
                key: resolve(&pair.key, context, policy)?,
                value: resolve(&pair.value, context, policy)?,
                enabled: true,
            })
        })
        .collect()
}

/// Resolves URL, headers, query parameters and body content of a request.
///
/// # Returns
///
/// A new request with templates substituted. Auth fields and script text are
/// copied unchanged.
pub fn resolve_request(
    request: &Request,
    context: &VariableContext,
    policy: MissingVariablePolicy,
) -> Result<Request, VarError> {
    let mut resolved = request.clone();
    resolved.url = resolve(&request.url, context, policy)?;
    resolved.headers = resolve_key_value_pairs(&request.headers, context, policy)?;
    resolved.query_params = resolve_key_value_pairs(&request.query_params, context, policy)?;
    resolved.body = resolve_body(&request.body, context, policy)?;
    Ok(resolved)
}

fn resolve_body(
    body: &RequestBody,
    context: &VariableContext,
    policy: MissingVariablePolicy,
) -> Result<RequestBody, VarError> {
    Ok(match body {
        RequestBody::None => RequestBody::None,
        RequestBody::Raw {
            content,
            content_type,
        } => RequestBody::Raw {
            content: resolve(content, context, policy)?,
            content_type: content_type.clone(),
        },
        RequestBody::Json { content } => RequestBody::Json {
            content: resolve(content, context, policy)?,
        },
        RequestBody::FormData { fields } => RequestBody::FormData {
            fields: resolve_key_value_pairs(fields, context, policy)?,
        },
        RequestBody::UrlEncoded { fields } => RequestBody::UrlEncoded {
            fields: resolve_key_value_pairs(fields, context, policy)?,
        },
    })
}

/// Resolves templates inside credential fields.
///
/// Not applied by [`resolve_request`]; only used when auth resolution is
/// explicitly enabled.
pub fn resolve_auth(
    auth: &AuthConfig,
    context: &VariableContext,
    policy: MissingVariablePolicy,
) -> Result<AuthConfig, VarError> {
    let r = |text: &str| resolve(text, context, policy);
    Ok(match auth {
        AuthConfig::None => AuthConfig::None,
        AuthConfig::Basic { username, password } => AuthConfig::Basic {
            username: r(username)?,
            password: r(password)?,
        },
        AuthConfig::Bearer { token } => AuthConfig::Bearer { token: r(token)? },
        AuthConfig::ApiKey {
            key,
            value,
            location,
        } => AuthConfig::ApiKey {
            key: r(key)?,
            value: r(value)?,
            location: *location,
        },
        AuthConfig::OAuth2ClientCredentials {
            token_url,
            client_id,
            client_secret,
            scope,
        } => AuthConfig::OAuth2ClientCredentials {
            token_url: r(token_url)?,
            client_id: r(client_id)?,
            client_secret: r(client_secret)?,
            scope: scope.as_deref().map(r).transpose()?,
        },
    })
}
