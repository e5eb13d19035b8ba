//! Refresh-token exchange.
//!
//! Chartmetric hands out a long-lived refresh token; every run trades it for
//! a short-lived bearer token with a single `POST /token`. The token is
//! returned to the caller and threaded through [`ChartmetricClient`]
//! explicitly rather than cached globally.
//!
//! [`ChartmetricClient`]: crate::ChartmetricClient

use crate::config::ClientConfig;
use crate::{ChartmetricError, Result};
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Long-lived refresh credential. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ChartmetricError::Config(
                "refresh credential must not be empty".to_string(),
            ));
        }
        Ok(Self(value.trim().to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Short-lived bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    refreshtoken: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Exchange `credential` for an access token.
///
/// Performs exactly one network call and never retries. Every failure
/// (transport, timeout, non-2xx status, unexpected body) is reported as
/// [`ChartmetricError::Auth`].
///
/// # Examples
///
/// ```rust,no_run
/// # use cm_spins::{ClientConfig, Credential};
/// # tokio_test::block_on(async {
/// let http = http_client::native::NativeClient::new();
/// let credential = Credential::new("refresh-token")?;
/// let token = cm_spins::obtain_token(&http, &ClientConfig::default(), &credential).await?;
/// # Ok::<(), cm_spins::ChartmetricError>(())
/// # });
/// ```
pub async fn obtain_token<H>(
    http: &H,
    config: &ClientConfig,
    credential: &Credential,
) -> Result<AccessToken>
where
    H: HttpClient + ?Sized,
{
    let token_url = format!("{}/token", config.base_url);
    let url = token_url
        .parse::<Url>()
        .map_err(|e| ChartmetricError::Config(format!("Invalid token URL '{token_url}': {e}")))?;

    let body = serde_json::to_string(&TokenRequest {
        refreshtoken: credential.expose(),
    })?;

    let mut request = Request::new(Method::Post, url);
    request.insert_header("Content-Type", "application/json");
    request.insert_header("Accept", "application/json");
    request.set_body(body);

    log::debug!("Exchanging refresh token at {token_url}");

    let exchange = async move {
        let mut response = http
            .send(request)
            .await
            .map_err(|e| ChartmetricError::Auth(format!("token request failed: {e}")))?;
        let status = response.status();
        let text = response
            .body_string()
            .await
            .map_err(|e| ChartmetricError::Auth(format!("failed to read token response: {e}")))?;
        Ok::<_, ChartmetricError>((status, text))
    };

    let (status, text) = tokio::time::timeout(config.request_timeout, exchange)
        .await
        .map_err(|_| {
            ChartmetricError::Auth(format!(
                "token request timed out after {:?}",
                config.request_timeout
            ))
        })??;

    if !status.is_success() {
        return Err(ChartmetricError::Auth(format!(
            "token endpoint returned {}: {}",
            u16::from(status),
            crate::client::truncate_body(&text)
        )));
    }

    let parsed: TokenResponse = serde_json::from_str(&text)
        .map_err(|e| ChartmetricError::Auth(format!("malformed token response: {e}")))?;

    match parsed.token {
        Some(token) if !token.is_empty() => {
            log::info!("Access token obtained");
            Ok(AccessToken::new(token))
        }
        _ => Err(ChartmetricError::Auth(
            "token response did not contain a token".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejects_empty() {
        assert!(matches!(Credential::new(""), Err(ChartmetricError::Config(_))));
        assert!(matches!(Credential::new(" \t"), Err(ChartmetricError::Config(_))));
        assert_eq!(Credential::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let credential = Credential::new("super-secret").unwrap();
        let token = AccessToken::new("bearer-secret");
        assert!(!format!("{credential:?}").contains("super-secret"));
        assert!(!format!("{token:?}").contains("bearer-secret"));
        assert_eq!(token.bearer(), "Bearer bearer-secret");
    }
}
