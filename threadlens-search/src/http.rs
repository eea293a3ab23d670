//! Upstream HTTP access with authentication, retry and concurrency limiting.
//!
//! [`build_client`] configures the shared [`reqwest::Client`].
//! [`UpstreamClient`] wraps it with the behaviour every retrieval strategy
//! needs: a bearer token when credentials exist, the process-wide
//! [`Semaphore`] that caps outbound requests, the [`RetryPolicy`] backoff
//! loop, and prompt cancellation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::AuthManager;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::retry::RetryPolicy;

/// Header carrying seconds until the upstream rate-limit window resets.
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Build a [`reqwest::Client`] for the content API.
///
/// The client has:
/// - a stable User-Agent (the upstream blocks generic or rotating agents)
/// - the per-request timeout from config
/// - gzip decompression
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .gzip(true)
        .build()
        .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))
}

/// Outcome of a single HTTP attempt, before retry decisions.
enum Attempt {
    Success(String),
    /// 401 with the token that was sent (if any).
    Unauthorized(Option<String>),
    RateLimited {
        reset_after: Option<Duration>,
        error: SearchError,
    },
    Retryable(SearchError),
    Fatal(SearchError),
}

/// Retrying, authenticated, concurrency-limited GET access to the content API.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    auth: Option<Arc<AuthManager>>,
    retry: RetryPolicy,
    limiter: Arc<Semaphore>,
}

impl UpstreamClient {
    /// Create a client rooted at `base_url`.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        auth: Option<Arc<AuthManager>>,
        retry: RetryPolicy,
        limiter: Arc<Semaphore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            retry,
            limiter,
        }
    }

    /// Whether requests carry a bearer token.
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Build the absolute URL for `path` with query parameters.
    ///
    /// `raw_json=1` is always appended so text fields arrive unescaped.
    pub fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, SearchError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| SearchError::Validation(format!("invalid endpoint {raw}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("raw_json", "1");
        }
        Ok(url)
    }

    /// GET `path` and return the response body.
    ///
    /// Retries transport errors and error statuses with backoff. A 401
    /// invalidates the token, refreshes it and retries once with a reset
    /// backoff. A 429 waits for the advertised reset (capped by the
    /// policy's maximum delay) before retrying.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Timeout`] as soon as `cancel` fires
    /// - [`SearchError::Auth`] on a second consecutive 401 or a 401 without credentials
    /// - [`SearchError::RateLimited`] when 429s exhaust the retry budget
    /// - [`SearchError::Upstream`] when other failures exhaust the retry budget
    pub async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<String, SearchError> {
        let url = self.endpoint(path, params)?;
        let mut retries = 0u32;
        let mut refreshed_auth = false;

        loop {
            if cancel.is_cancelled() {
                return Err(SearchError::Timeout("search cancelled".into()));
            }

            match self.attempt(&url, cancel).await {
                Attempt::Success(body) => return Ok(body),
                Attempt::Fatal(error) => return Err(error),
                Attempt::Unauthorized(sent) => {
                    let Some(auth) = self.auth.as_ref() else {
                        return Err(SearchError::Auth(
                            "upstream requires authentication (HTTP 401)".into(),
                        ));
                    };
                    if refreshed_auth {
                        return Err(SearchError::Auth(
                            "upstream rejected a freshly issued token (HTTP 401)".into(),
                        ));
                    }
                    refreshed_auth = true;
                    match sent {
                        Some(token) => auth.invalidate_rejected(&token).await,
                        None => auth.invalidate().await,
                    }
                    retries = 0;
                    tracing::debug!(path, "HTTP 401, retrying with a fresh token");
                }
                Attempt::RateLimited { reset_after, error } => {
                    if !self.retry.allows_retry(retries) {
                        return Err(SearchError::RateLimited(error.message().to_string()));
                    }
                    retries += 1;
                    let cap = Duration::from_millis(self.retry.max_delay_ms);
                    let delay = reset_after
                        .map(|d| d.min(cap))
                        .unwrap_or_else(|| self.retry.delay_for_attempt(retries));
                    tracing::warn!(path, retry = retries, delay_ms = delay.as_millis() as u64, "rate limited");
                    sleep_or_cancel(delay, cancel).await?;
                }
                Attempt::Retryable(error) => {
                    if !self.retry.allows_retry(retries) {
                        return Err(error);
                    }
                    retries += 1;
                    let delay = self.retry.delay_for_attempt(retries);
                    tracing::warn!(path, retry = retries, delay_ms = delay.as_millis() as u64, error = %error, "upstream request failed, backing off");
                    sleep_or_cancel(delay, cancel).await?;
                }
            }
        }
    }

    async fn attempt(&self, url: &Url, cancel: &CancellationToken) -> Attempt {
        let token = match &self.auth {
            Some(auth) => match auth.get_token(cancel).await {
                Ok(token) => Some(token),
                Err(error) => return Attempt::Fatal(error),
            },
            None => None,
        };

        let _permit = tokio::select! {
            _ = cancel.cancelled() => {
                return Attempt::Fatal(SearchError::Timeout("cancelled waiting for a request slot".into()));
            }
            permit = self.limiter.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return Attempt::Fatal(SearchError::Upstream("request limiter closed".into())),
            },
        };

        let mut request = self.client.get(url.clone());
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Attempt::Fatal(SearchError::Timeout("cancelled during request".into()));
            }
            sent = request.send() => match sent {
                Ok(response) => response,
                Err(e) => {
                    return Attempt::Retryable(SearchError::Upstream(format!(
                        "{} request failed: {e}",
                        url.path()
                    )));
                }
            },
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Attempt::Unauthorized(token);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited {
                reset_after: reset_after(response.headers()),
                error: SearchError::RateLimited(format!("{} returned HTTP 429", url.path())),
            };
        }
        if !status.is_success() {
            return Attempt::Retryable(SearchError::Upstream(format!(
                "{} returned HTTP {}",
                url.path(),
                status.as_u16()
            )));
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => {
                return Attempt::Fatal(SearchError::Timeout("cancelled while reading response".into()));
            }
            body = response.text() => body,
        };
        match body {
            Ok(body) => {
                tracing::trace!(path = url.path(), bytes = body.len(), "upstream response received");
                Attempt::Success(body)
            }
            Err(e) => Attempt::Retryable(SearchError::Upstream(format!(
                "{} response read failed: {e}",
                url.path()
            ))),
        }
    }
}

/// Parse the rate-limit reset hint from response headers.
///
/// Prefers the upstream's `x-ratelimit-reset` (seconds, possibly
/// fractional) and falls back to a numeric `Retry-After`. Values too large
/// for a `Duration` saturate; the caller caps the wait.
fn reset_after(headers: &HeaderMap) -> Option<Duration> {
    [RATELIMIT_RESET, RETRY_AFTER.as_str()]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), SearchError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SearchError::Timeout("cancelled during backoff".into())),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
