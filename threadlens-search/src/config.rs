//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls upstream endpoints, credentials, timeouts,
//! concurrency, retry behaviour and caching. Every field has a default so
//! partially specified TOML sections deserialize cleanly.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::retry::RetryPolicy;

/// Authenticated API base URL.
pub const DEFAULT_BASE_URL: &str = "https://oauth.reddit.com";

/// Anonymous API base URL, used when no credentials are configured.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://www.reddit.com";

/// Credential exchange endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Stable client identity sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("threadlens/", env!("CARGO_PKG_VERSION"));

/// Width of the process-wide outbound concurrency limiter.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Configuration for the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether search outputs are cached at all.
    pub enabled: bool,
    /// Time-to-live for cached search outputs, in seconds.
    pub ttl_seconds: u64,
    /// Maximum number of cached search outputs.
    pub max_entries: usize,
    /// Maximum cumulative estimated size of cached outputs, in bytes.
    pub max_bytes: usize,
    /// Interval of the background sweep of expired entries, in seconds.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 600,
            max_entries: 200,
            max_bytes: 16 * 1024 * 1024,
            sweep_interval_seconds: 60,
        }
    }
}

/// Configuration for forum search.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL for authenticated API requests.
    pub base_url: String,
    /// Base URL for anonymous requests when no credentials are set.
    pub public_base_url: String,
    /// Credential exchange endpoint.
    pub token_url: String,
    /// OAuth client id. Anonymous access when `None`.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// User-Agent sent on every request.
    pub user_agent: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_seconds: u64,
    /// Overall deadline for one search, in seconds.
    pub search_timeout_seconds: u64,
    /// Maximum simultaneous outbound requests across all searches.
    pub max_concurrency: usize,
    /// Items requested from the upstream per strategy (capped at 100).
    pub per_strategy_limit: usize,
    /// A token is refreshed once fewer than this many seconds remain.
    pub token_refresh_buffer_seconds: u64,
    /// Backoff policy for every upstream request.
    pub retry: RetryPolicy,
    /// Result cache settings.
    pub cache: CacheConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            client_id: None,
            client_secret: None,
            user_agent: DEFAULT_USER_AGENT.into(),
            request_timeout_seconds: 10,
            search_timeout_seconds: 20,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            per_strategy_limit: 25,
            token_refresh_buffer_seconds: 60,
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Whether both halves of the client credentials are present.
    pub fn has_credentials(&self) -> bool {
        matches!(
            (self.client_id.as_deref(), self.client_secret.as_deref()),
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty()
        )
    }

    /// The base URL requests should go to, given the credential situation.
    pub fn effective_base_url(&self) -> &str {
        if self.has_credentials() {
            &self.base_url
        } else {
            &self.public_base_url
        }
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - timeouts and `max_concurrency` must be greater than 0
    /// - `per_strategy_limit` must be within 1..=100
    /// - base URLs must parse
    /// - client id and secret must be set together
    /// - retry multiplier must be >= 1.0 and jitter within 0..1
    /// - cache bounds must be non-zero when caching is enabled
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.request_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "request_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.search_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "search_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(SearchError::Config(
                "max_concurrency must be greater than 0".into(),
            ));
        }
        if self.per_strategy_limit == 0 || self.per_strategy_limit > 100 {
            return Err(SearchError::Config(
                "per_strategy_limit must be between 1 and 100".into(),
            ));
        }
        for (name, value) in [
            ("base_url", &self.base_url),
            ("public_base_url", &self.public_base_url),
            ("token_url", &self.token_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| SearchError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        if self.client_id.is_some() != self.client_secret.is_some() {
            return Err(SearchError::Config(
                "client_id and client_secret must be set together".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SearchError::Config("user_agent must not be empty".into()));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(SearchError::Config(
                "retry.backoff_multiplier must be >= 1.0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.retry.jitter_ratio) {
            return Err(SearchError::Config(
                "retry.jitter_ratio must be in [0, 1)".into(),
            ));
        }
        if self.cache.enabled {
            if self.cache.max_entries == 0 || self.cache.max_bytes == 0 {
                return Err(SearchError::Config(
                    "cache.max_entries and cache.max_bytes must be greater than 0".into(),
                ));
            }
            if self.cache.sweep_interval_seconds == 0 {
                return Err(SearchError::Config(
                    "cache.sweep_interval_seconds must be greater than 0".into(),
                ));
            }
        }
        Ok(())
    }
}
