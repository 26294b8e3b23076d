use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::utils::truncate_for_log;
use std::fmt;
use tracing::{debug, warn};

use crate::config::{IAM_APIKEY_GRANT_TYPE, IAM_TOKEN_URL, MAX_ERROR_BODY_BYTES};
use crate::error::CloudantError;

/// Short-lived IAM access token presented as `Authorization: Bearer`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<BearerToken, CloudantError>;
}

/// Exchanges an API key for a bearer token at the IAM token endpoint.
///
/// Every call performs a fresh exchange; tokens are never cached.
pub struct IamTokenProvider {
    client: Client,
    token_url: String,
    api_key: String,
}

impl IamTokenProvider {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self::with_token_url(client, api_key, IAM_TOKEN_URL)
    }

    pub fn with_token_url(
        client: Client,
        api_key: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl fmt::Debug for IamTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamTokenProvider")
            .field("token_url", &self.token_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for IamTokenProvider {
    async fn fetch_token(&self) -> Result<BearerToken, CloudantError> {
        debug!("Requesting IAM token from {}", self.token_url);

        let params = [
            ("grant_type", IAM_APIKEY_GRANT_TYPE),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("IAM token exchange failed with HTTP {}", status);
            return Err(CloudantError::TokenExchange {
                status,
                body: truncate_for_log(&error_text, MAX_ERROR_BODY_BYTES).to_string(),
            });
        }

        let token_response: TokenResponse = response.json().await?;
        debug!(
            "IAM token obtained (type: {}, expires_in: {:?})",
            token_response.token_type.as_deref().unwrap_or("unknown"),
            token_response.expires_in
        );

        Ok(BearerToken::new(token_response.access_token))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
