//! Error types for the threadlens-search crate.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! part of the `Display` output and accessible via [`SearchError::code()`].
//! Messages never contain credentials or bearer tokens.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Empty or invalid query, mode or limit.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

    /// Credential exchange or bearer token failure.
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Non-success responses from the content API after retries.
    pub const UPSTREAM_FAILED: &str = "UPSTREAM_FAILED";

    /// The content API kept answering 429 until the retry budget ran out.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// A payload could not be decoded.
    pub const PARSE_FAILED: &str = "PARSE_FAILED";

    /// The caller's deadline elapsed or the operation was cancelled.
    pub const TIMEOUT: &str = "TIMEOUT";

    /// Invalid search configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Errors that can occur during a forum search.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// The query, mode or limit was rejected before any request was made.
    #[error("[{}] {}", error_codes::VALIDATION_FAILED, .0)]
    Validation(String),

    /// The credential exchange failed or the upstream kept rejecting the token.
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    Auth(String),

    /// Every retrieval strategy failed against the content API.
    #[error("[{}] {}", error_codes::UPSTREAM_FAILED, .0)]
    Upstream(String),

    /// HTTP 429 responses exhausted the retry budget.
    #[error("[{}] {}", error_codes::RATE_LIMITED, .0)]
    RateLimited(String),

    /// A response body could not be decoded.
    #[error("[{}] {}", error_codes::PARSE_FAILED, .0)]
    Parse(String),

    /// The deadline elapsed or the caller cancelled the search.
    #[error("[{}] {}", error_codes::TIMEOUT, .0)]
    Timeout(String),

    /// Invalid search configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),
}

impl SearchError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => error_codes::VALIDATION_FAILED,
            Self::Auth(_) => error_codes::AUTH_FAILED,
            Self::Upstream(_) => error_codes::UPSTREAM_FAILED,
            Self::RateLimited(_) => error_codes::RATE_LIMITED,
            Self::Parse(_) => error_codes::PARSE_FAILED,
            Self::Timeout(_) => error_codes::TIMEOUT,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Auth(m)
            | Self::Upstream(m)
            | Self::RateLimited(m)
            | Self::Parse(m)
            | Self::Timeout(m)
            | Self::Config(m) => m,
        }
    }

    /// Returns true if a request that failed with this error may be retried.
    ///
    /// Transport failures, 5xx responses and rate limits are transient.
    /// Validation, parse, config and timeout errors are not: retrying
    /// would either fail identically or outlive the caller's deadline.
    /// Auth failures are handled by the dedicated invalidate-and-refresh
    /// path rather than the generic backoff loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::RateLimited(_))
    }

    /// Discriminant used when aggregating branch failures.
    pub(crate) fn same_category(&self, other: &SearchError) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Same category, different message.
    pub(crate) fn with_message(&self, message: String) -> SearchError {
        match self {
            Self::Validation(_) => Self::Validation(message),
            Self::Auth(_) => Self::Auth(message),
            Self::Upstream(_) => Self::Upstream(message),
            Self::RateLimited(_) => Self::RateLimited(message),
            Self::Parse(_) => Self::Parse(message),
            Self::Timeout(_) => Self::Timeout(message),
            Self::Config(_) => Self::Config(message),
        }
    }
}

/// Convenience type alias for threadlens-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
