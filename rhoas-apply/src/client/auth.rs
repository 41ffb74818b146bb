//! Access tokens from an offline token.

use chrono::{DateTime, Duration, Utc};
use rhoas_reconcile::{ApiError, TransportMeta};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges the offline token for short-lived access tokens and caches them.
pub struct TokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    offline_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(
        http: reqwest::Client,
        token_url: String,
        client_id: String,
        offline_token: String,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id,
            offline_token,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        debug!(url = %self.token_url, "Refreshing access token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", self.offline_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::without_response(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return Err(ApiError::new(
                    "token response could not be read",
                    TransportMeta::unreadable(status.as_u16(), e.to_string()),
                ));
            }
        };
        let meta = TransportMeta::new(status.as_u16(), body.to_vec());
        if !status.is_success() {
            return Err(ApiError::new(
                format!("token request rejected: {}", status),
                meta,
            ));
        }
        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| ApiError::new(format!("invalid token response: {}", e), meta))?;

        let lifetime = (token.expires_in - EXPIRY_MARGIN_SECS).max(0);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        });
        Ok(token.access_token)
    }
}
