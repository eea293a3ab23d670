//! Retry policy shared by every retrieval strategy.
//!
//! The policy is a plain value: it computes delays but never sleeps and
//! never inspects errors. The HTTP layer decides *whether* to retry and
//! asks the policy *how long* to wait.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Default maximum delay for exponential backoff in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Default symmetric jitter as a fraction of the delay (±10%).
pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

/// Exponential backoff with symmetric jitter.
///
/// ```
/// use threadlens_search::retry::RetryPolicy;
///
/// let policy = RetryPolicy::default().with_jitter_ratio(0.0);
/// assert_eq!(policy.delay_for_attempt(1).as_millis(), 500);
/// assert_eq!(policy.delay_for_attempt(2).as_millis(), 750);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds (before jitter).
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Jitter as a fraction of the delay, applied in both directions.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Set the jitter ratio.
    pub fn with_jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio;
        self
    }

    /// Whether another retry is allowed after `retries_done` retries.
    pub fn allows_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `attempt` (1-based), with random jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, rand::random::<f64>())
    }

    /// Delay before retry number `attempt` given a jitter sample in `[0, 1)`.
    ///
    /// Formula: `min(base * multiplier^(attempt-1), max) * (1 + ratio * (2u - 1))`.
    /// A sample of 0.5 yields the un-jittered delay.
    pub fn delay_with_jitter(&self, attempt: u32, unit_sample: f64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.base_delay_ms as f64;
        let max = self.max_delay_ms as f64;
        let exp = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = (base * exp).min(max);

        let unit = unit_sample.clamp(0.0, 1.0);
        let factor = 1.0 + self.jitter_ratio * (2.0 * unit - 1.0);
        let total_ms = (delay * factor).max(0.0);

        Duration::from_millis(total_ms.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(policy.base_delay_ms, DEFAULT_BASE_DELAY_MS);
        assert_eq!(policy.max_delay_ms, DEFAULT_MAX_DELAY_MS);
        assert_eq!(policy.backoff_multiplier, 1.5);
        assert_eq!(policy.jitter_ratio, 0.1);
    }

    #[test]
    fn builder() {
        let policy = RetryPolicy::new()
            .with_max_retries(5)
            .with_base_delay_ms(100)
            .with_max_delay_ms(2_000)
            .with_backoff_multiplier(2.0)
            .with_jitter_ratio(0.0);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay_ms, 100);
        assert_eq!(policy.max_delay_ms, 2_000);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.jitter_ratio, 0.0);
    }

    #[test]
    fn zero_attempt_has_no_delay() {
        assert_eq!(RetryPolicy::new().delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn growth_is_geometric_at_midpoint_sample() {
        let policy = RetryPolicy::new().with_base_delay_ms(1_000);
        assert_eq!(policy.delay_with_jitter(1, 0.5).as_millis(), 1_000);
        assert_eq!(policy.delay_with_jitter(2, 0.5).as_millis(), 1_500);
        assert_eq!(policy.delay_with_jitter(3, 0.5).as_millis(), 2_250);
    }

    #[test]
    fn jitter_bounds_are_symmetric() {
        let policy = RetryPolicy::new().with_base_delay_ms(1_000);
        assert_eq!(policy.delay_with_jitter(1, 0.0).as_millis(), 900);
        assert_eq!(policy.delay_with_jitter(1, 1.0).as_millis(), 1_100);
    }

    #[test]
    fn random_delay_stays_within_jitter_band() {
        let policy = RetryPolicy::new().with_base_delay_ms(1_000);
        for _ in 0..50 {
            let ms = policy.delay_for_attempt(1).as_millis();
            assert!((900..=1_100).contains(&ms), "delay {ms} outside band");
        }
    }

    #[test]
    fn delay_capped_by_max() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(1_000)
            .with_max_delay_ms(3_000);
        // Uncapped this would be 1000 * 1.5^9 ≈ 38s.
        assert_eq!(policy.delay_with_jitter(10, 0.5).as_millis(), 3_000);
        assert!(policy.delay_for_attempt(10).as_millis() <= 3_300);
    }

    #[test]
    fn allows_retry_respects_budget() {
        let policy = RetryPolicy::new().with_max_retries(2);
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
        assert!(!RetryPolicy::new().with_max_retries(0).allows_retry(0));
    }

    #[test]
    fn deserializes_partial_toml_like_json() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_retries": 1}"#).expect("deserialize");
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.base_delay_ms, DEFAULT_BASE_DELAY_MS);
    }
}
