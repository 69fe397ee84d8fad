//! OAuth2 client-credentials grant.
//!
//! Fetches an access token from the configured token endpoint right before the
//! request is sent. Tokens are not cached between requests.

use super::basic::basic_auth;
use super::AuthError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// Requests an access token using the client-credentials grant (RFC 6749 §4.4).
///
/// Client credentials are sent with HTTP Basic authentication and the grant
/// parameters as a form body.
///
/// # Returns
///
/// The `access_token` from the token endpoint's JSON response.
pub async fn fetch_client_credentials_token(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    scope: Option<&str>,
) -> Result<String, AuthError> {
    let mut form = vec![("grant_type", "client_credentials")];
    if let Some(scope) = scope.filter(|s| !s.is_empty()) {
        form.push(("scope", scope));
    }

    let response = client
        .post(token_url)
        .header("Authorization", basic_auth(client_id, client_secret))
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::TokenRequest(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::TokenRequest(format!(
            "token endpoint returned {}",
            status.as_u16()
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

    if let Some(token_type) = token.token_type.as_deref() {
        if !token_type.eq_ignore_ascii_case("bearer") {
            log::warn!("OAuth2 token endpoint returned token_type '{}'", token_type);
        }
    }

    Ok(token.access_token)
}
