//! # Exponential backoff retry policy.
//!
//! [`ExponentialBackoff`] doubles the wait after each retry, up to a cap:
//! - `next_delay(0)` → `base_delay`
//! - `next_delay(n)` → `min(base_delay × 2^min(30, n-1), max_interval)`
//!
//! The exponent is capped at 30 and the multiplication saturates, so arbitrarily
//! large retry counts can never overflow; they simply land on `max_interval`.
//! Jitter, when configured, is applied to the capped value and never feeds back
//! into later calculations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use retrykit::{ExponentialBackoff, RetryPolicy};
//!
//! let backoff = ExponentialBackoff::new(5, Duration::from_millis(100), Duration::from_secs(1));
//!
//! assert_eq!(backoff.next_delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(2), Duration::from_millis(200));
//! assert_eq!(backoff.next_delay(3), Duration::from_millis(400));
//! // 100ms × 2^9 → capped at 1s
//! assert_eq!(backoff.next_delay(10), Duration::from_secs(1));
//! ```

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    error::TaskError,
    policies::{
        jitter::JitterPolicy,
        retry::{always, gate, ConditionDebug, RetryCondition, RetryPolicy},
    },
    tasks::TaskResult,
};

/// Largest exponent applied to the base delay.
const MAX_EXPONENT: u32 = 30;

/// Doubling retry policy with a ceiling.
#[derive(Clone)]
pub struct ExponentialBackoff {
    /// Maximum number of retries (attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_interval: Duration,
    /// Which errors are worth retrying.
    pub condition: RetryCondition,
    /// Randomization applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl ExponentialBackoff {
    /// Retries up to `max_retries` times for any error.
    pub fn new(max_retries: u32, base_delay: Duration, max_interval: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_interval,
            condition: always(),
            jitter: JitterPolicy::None,
        }
    }

    /// Restricts retries to errors matching `condition`.
    pub fn retry_if<F>(mut self, condition: F) -> Self
    where
        F: Fn(&TaskError) -> bool + Send + Sync + 'static,
    {
        self.condition = Arc::new(condition);
        self
    }

    /// Applies jitter to every delay.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    fn base(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return self.base_delay;
        }
        let exponent = (retry_count - 1).min(MAX_EXPONENT);
        let multiplier = 1u32 << exponent;
        self.base_delay
            .checked_mul(multiplier)
            .map_or(self.max_interval, |d| d.min(self.max_interval))
    }
}

impl fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_interval", &self.max_interval)
            .field("condition", &ConditionDebug)
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn can_retry(&self, retry_count: u32, last: &TaskResult, error: Option<&TaskError>) -> bool {
        gate(retry_count, self.max_retries, last, error, &self.condition)
    }

    fn next_delay(&self, retry_count: u32) -> Duration {
        let base = self.base(retry_count);
        match self.jitter {
            JitterPolicy::Decorrelated => self.jitter.apply_decorrelated(
                self.base_delay.min(self.max_interval),
                base,
                self.max_interval,
            ),
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64) -> ExponentialBackoff {
        ExponentialBackoff::new(3, Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    #[test]
    fn zero_returns_base() {
        assert_eq!(policy(100, 30_000).next_delay(0), Duration::from_millis(100));
    }

    #[test]
    fn doubles_per_retry() {
        let p = policy(100, 30_000);
        assert_eq!(p.next_delay(1), Duration::from_millis(100));
        assert_eq!(p.next_delay(2), Duration::from_millis(200));
        assert_eq!(p.next_delay(3), Duration::from_millis(400));
        assert_eq!(p.next_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn clamped_to_max() {
        let p = policy(100, 250);
        assert_eq!(p.next_delay(2), Duration::from_millis(200));
        assert_eq!(p.next_delay(3), Duration::from_millis(250));
    }

    #[test]
    fn huge_retry_count_does_not_overflow() {
        let p = ExponentialBackoff::new(3, Duration::from_secs(3600), Duration::from_secs(60));
        assert_eq!(p.next_delay(u32::MAX), Duration::from_secs(60));
        assert_eq!(p.next_delay(31), Duration::from_secs(60));
    }

    #[test]
    fn exponent_caps_at_thirty() {
        let p = ExponentialBackoff::new(3, Duration::from_nanos(1), Duration::from_secs(10));
        assert_eq!(p.next_delay(31), Duration::from_nanos(1 << 30));
        assert_eq!(p.next_delay(1000), Duration::from_nanos(1 << 30));
    }

    #[test]
    fn same_gating_as_fixed_delay() {
        let p = policy(10, 1000);
        let failed = TaskResult::failed().build();
        let cancelled = TaskResult::cancelled().build();
        assert!(p.can_retry(2, &failed, None));
        assert!(!p.can_retry(3, &failed, None));
        assert!(!p.can_retry(0, &cancelled, None));
    }

    #[test]
    fn equal_jitter_bounds() {
        let p = policy(1000, 30_000).with_jitter(JitterPolicy::Equal);
        for n in 1..4 {
            let base = 1000u64 << (n - 1);
            let d = p.next_delay(n);
            assert!(d >= Duration::from_millis(base / 2));
            assert!(d <= Duration::from_millis(base));
        }
    }

    #[test]
    fn decorrelated_jitter_stays_within_floor_and_cap() {
        let p = policy(100, 5_000).with_jitter(JitterPolicy::Decorrelated);
        for _ in 0..100 {
            let d = p.next_delay(6);
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(5_000));
        }
    }
}
