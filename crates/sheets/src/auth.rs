use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rackbot_core::config::SheetsCredentials;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::backend::BackendError;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Tokens are refreshed this long before the expiry the endpoint reports.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Source of bearer tokens for the Sheets API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, BackendError>;

    /// Drops any cached token after the API rejected it.
    async fn invalidate(&self);
}

/// A fixed token, typically minted outside the bot.
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<SecretString, BackendError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {
        warn!(
            event_name = "sheets.auth.static_token_rejected",
            "static access token was rejected; it cannot be refreshed"
        );
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Exchanges an OAuth refresh token for short-lived access tokens and caches them.
pub struct RefreshTokenProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    cached: Mutex<Option<CachedToken>>,
}

impl RefreshTokenProvider {
    pub fn new(
        client: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: SecretString,
        refresh_token: SecretString,
    ) -> Self {
        Self {
            client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret,
            refresh_token,
            cached: Mutex::new(None),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    async fn refresh(&self) -> Result<CachedToken, BackendError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("refresh_token", self.refresh_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|error| BackendError::Transient(format!("token refresh request failed: {error}")))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(BackendError::Transient(format!("token endpoint returned {status}")));
        }
        if !status.is_success() {
            return Err(BackendError::Unauthorized(format!("token endpoint returned {status}")));
        }

        let body: RefreshResponse = response.json().await.map_err(|error| {
            BackendError::Fatal(format!("failed to decode token response: {error}"))
        })?;
        if body.access_token.is_empty() {
            return Err(BackendError::Unauthorized(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        let lifetime = body.expires_in.unwrap_or(3_600).max(EXPIRY_MARGIN_SECS * 2);
        debug!(event_name = "sheets.auth.refreshed", expires_in = lifetime, "access token refreshed");
        Ok(CachedToken {
            token: SecretString::from(body.access_token),
            expires_at: Utc::now() + Duration::seconds(lifetime - EXPIRY_MARGIN_SECS),
        })
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn access_token(&self) -> Result<SecretString, BackendError> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if current.expires_at > Utc::now() {
                return Ok(current.token.clone());
            }
        }
        let fresh = self.refresh().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

pub fn token_provider(
    client: &reqwest::Client,
    credentials: &SheetsCredentials,
    token_url: &str,
) -> Box<dyn TokenProvider> {
    match credentials {
        SheetsCredentials::AccessToken(token) => Box::new(StaticTokenProvider::new(token.clone())),
        SheetsCredentials::RefreshToken { client_id, client_secret, refresh_token } => {
            Box::new(RefreshTokenProvider::new(
                client.clone(),
                client_id.clone(),
                client_secret.clone(),
                refresh_token.clone(),
            )
            .with_token_url(token_url))
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::{ExposeSecret, SecretString};

    use super::{StaticTokenProvider, TokenProvider};

    #[tokio::test]
    async fn static_provider_survives_invalidation() {
        let provider = StaticTokenProvider::new(SecretString::from("ya29.token".to_string()));
        provider.invalidate().await;
        let token = provider.access_token().await.expect("token");
        assert_eq!(token.expose_secret(), "ya29.token");
    }
}
