//! CSRF tokens for mutating calls.

use serde::Deserialize;
use std::fmt;
use tracing::debug;

use crate::error::ClientError;

/// Short-lived token required on every mutating call.
///
/// Never cached: callers fetch a fresh one right before each request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Fetches tokens from the service's token endpoint.
#[derive(Clone)]
pub struct TokenProvider {
    inner: reqwest::Client,
    url: String,
}

impl TokenProvider {
    /// Create a provider for the service at `base_url`.
    pub fn new(inner: reqwest::Client, base_url: &str) -> Self {
        Self {
            inner,
            url: format!(
                "{}/command/core/get-csrf-token",
                base_url.trim_end_matches('/')
            ),
        }
    }

    /// Fetch a fresh token. No retries.
    pub async fn fetch_token(&self) -> Result<AuthToken, ClientError> {
        debug!(url = %self.url, "Fetching CSRF token");

        let response = self.inner.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Protocol(format!(
                "HTTP {} from token endpoint",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("malformed token response: {}", e)))?;

        Ok(AuthToken(body.token))
    }
}
