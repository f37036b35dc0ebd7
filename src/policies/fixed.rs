//! # Fixed-delay retry policy.
//!
//! [`FixedDelay`] waits the same amount of time before every retry:
//! `next_delay(n) = min(delay, max_interval)` for all `n`, optionally jittered.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use retrykit::{FixedDelay, RetryPolicy};
//!
//! let policy = FixedDelay::new(3, Duration::from_millis(10));
//! assert_eq!(policy.next_delay(1), Duration::from_millis(10));
//! assert_eq!(policy.next_delay(99), Duration::from_millis(10));
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

/// Default retries used by processors that do not pick a policy.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default delay used by processors that do not pick a policy.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Constant-delay retry policy.
#[derive(Clone)]
pub struct FixedDelay {
    /// Maximum number of retries (attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Delay between attempts.
    pub delay: Duration,
    /// Upper bound applied to `delay`.
    pub max_interval: Duration,
    /// Which errors are worth retrying.
    pub condition: RetryCondition,
    /// Randomization applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl FixedDelay {
    /// Retries up to `max_retries` times, `delay` apart, for any error.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            max_interval: delay,
            condition: always(),
            jitter: JitterPolicy::None,
        }
    }

    /// Caps the delay.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
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
}

impl Default for FixedDelay {
    /// Two retries, 50ms apart, any error.
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_DELAY)
    }
}

impl fmt::Debug for FixedDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedDelay")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .field("max_interval", &self.max_interval)
            .field("condition", &ConditionDebug)
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl RetryPolicy for FixedDelay {
    fn can_retry(&self, retry_count: u32, last: &TaskResult, error: Option<&TaskError>) -> bool {
        gate(retry_count, self.max_retries, last, error, &self.condition)
    }

    fn next_delay(&self, _retry_count: u32) -> Duration {
        let capped = self.delay.min(self.max_interval);
        self.jitter.apply(capped)
    }
}
