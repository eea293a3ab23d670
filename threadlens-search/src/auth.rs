//! Bearer-token acquisition for the upstream content API.
//!
//! [`AuthManager`] performs the client-credentials exchange and caches the
//! resulting token until it is within the refresh buffer of expiry.
//! Readers share a read lock on the fast path; a refresh holds the write
//! lock and re-checks validity first, so concurrent callers that all saw an
//! expired token trigger exactly one network exchange.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::error::SearchError;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Advertised lifetimes are clamped to this.
const MAX_TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 3600;

/// A cached bearer credential.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    /// Create a token that expires at `expires_at`.
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// The raw bearer value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When the upstream stops accepting this token.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether more than `buffer` remains before expiry at `now`.
    pub fn is_fresh(&self, buffer: Duration, now: Instant) -> bool {
        self.expires_at > now + buffer
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// Acquires and caches the upstream bearer token.
pub struct AuthManager {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_buffer: Duration,
    token: RwLock<Option<AccessToken>>,
    refreshes: AtomicU64,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("refresh_buffer", &self.refresh_buffer)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Create a manager for explicit credentials.
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_buffer: Duration,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_buffer,
            token: RwLock::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Create a manager from configuration.
    ///
    /// Returns `None` when no credentials are configured, meaning requests
    /// go out anonymously.
    pub fn from_config(client: reqwest::Client, config: &SearchConfig) -> Option<Self> {
        if !config.has_credentials() {
            return None;
        }
        let id = config.client_id.clone()?;
        let secret = config.client_secret.clone()?;
        Some(Self::new(
            client,
            config.token_url.clone(),
            id,
            secret,
            Duration::from_secs(config.token_refresh_buffer_seconds),
        ))
    }

    /// Return a valid bearer token, refreshing it if necessary.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Auth`] if the exchange fails or returns no token
    /// - [`SearchError::Parse`] if the token response cannot be decoded
    /// - [`SearchError::Timeout`] if `cancel` fires during the exchange
    pub async fn get_token(&self, cancel: &CancellationToken) -> Result<String, SearchError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if token.is_fresh(self.refresh_buffer, Instant::now()) {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref() {
            if token.is_fresh(self.refresh_buffer, Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(SearchError::Timeout("cancelled during token refresh".into()));
            }
            fetched = self.fetch_token() => fetched?,
        };
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next [`get_token`](Self::get_token) refreshes.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
        tracing::debug!("access token invalidated");
    }

    /// Drop the cached token only if it is still the one the upstream rejected.
    ///
    /// When several branches see a 401 for the same token, the first one
    /// refreshes it; later ones must not throw the fresh token away.
    pub async fn invalidate_rejected(&self, rejected: &str) {
        let mut guard = self.token.write().await;
        if guard.as_ref().is_some_and(|t| t.value == rejected) {
            *guard = None;
            tracing::debug!("rejected access token invalidated");
        }
    }

    /// Number of credential exchanges performed so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, token: AccessToken) {
        *self.token.write().await = Some(token);
    }

    async fn fetch_token(&self) -> Result<AccessToken, SearchError> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(token_url = %self.token_url, "refreshing access token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SearchError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Auth(format!("token response read failed: {e}")))?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::Parse(format!("token response: {e}")))?;

        let value = match parsed.access_token {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                let reason = parsed.error.unwrap_or_else(|| "no access_token".into());
                return Err(SearchError::Auth(format!(
                    "token endpoint returned no token: {reason}"
                )));
            }
        };
        let lifetime = parsed
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
            .min(MAX_TOKEN_LIFETIME_SECS);
        tracing::debug!(lifetime_secs = lifetime, "access token refreshed");

        Ok(AccessToken::new(value, expiry_after(Instant::now(), lifetime)))
    }
}

fn expiry_after(now: Instant, lifetime_secs: u64) -> Instant {
    let lifetime = Duration::from_secs(lifetime_secs.min(MAX_TOKEN_LIFETIME_SECS));
    now.checked_add(lifetime).unwrap_or(now)
}
