use reqwest::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

use crate::error::{classify_response, StorageError};

/// Access tokens are refreshed this long before they actually expire.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Clone, Debug)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_SKEW < self.expires_at
    }
}

/// Long-lived refresh-token credentials plus the cached short-lived access
/// token minted from them.
pub(crate) struct TokenCache {
    app_key: String,
    app_secret: String,
    refresh_token: String,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub(crate) fn new(app_key: String, app_secret: String, refresh_token: String) -> Self {
        Self {
            app_key,
            app_secret,
            refresh_token,
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token, minting a fresh one through the OAuth2
    /// refresh-token grant when the cached one is missing or near expiry.
    pub(crate) async fn bearer(
        &self,
        client: &Client,
        api_base: &Url,
    ) -> Result<String, StorageError> {
        {
            let cached = self.cached.lock().expect("token lock poisoned");
            if let Some(token) = cached.as_ref() {
                if token.is_fresh(Instant::now()) {
                    return Ok(token.value.clone());
                }
            }
        }

        let token = self.refresh(client, api_base).await?;
        let value = token.value.clone();
        let mut cached = self.cached.lock().expect("token lock poisoned");
        *cached = Some(token);
        Ok(value)
    }

    async fn refresh(&self, client: &Client, api_base: &Url) -> Result<AccessToken, StorageError> {
        let url = api_base.join("/oauth2/token")?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.app_key.as_str()),
            ("client_secret", self.app_secret.as_str()),
        ];

        let response = client.post(url).form(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response("oauth2/token", "", status, &body));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in.max(30)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessToken, TokenResponse};
    use std::time::{Duration, Instant};

    #[test]
    fn access_token_freshness_honors_skew() {
        let now = Instant::now();
        let token = AccessToken {
            value: "tok".to_string(),
            expires_at: now + Duration::from_secs(120),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::from_secs(61)));
    }

    #[test]
    fn token_response_parses_dropbox_payload() {
        let body = r#"{
            "access_token": "sl.ABCD",
            "token_type": "bearer",
            "expires_in": 14400
        }"#;
        let parsed: TokenResponse = serde_json::from_str(body).expect("parse token response");
        assert_eq!(parsed.access_token, "sl.ABCD");
        assert_eq!(parsed.expires_in, 14400);
    }
}
