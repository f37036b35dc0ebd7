//! Retry policies.
//!
//! This module groups the knobs that control **whether** a failed attempt is
//! retried and **how long** to wait before the next one.
//!
//! ## Contents
//! - [`RetryPolicy`] the strategy contract (`can_retry` / `next_delay`)
//! - [`NoRetry`] never retries
//! - [`FixedDelay`] constant delay, capped by `max_interval`
//! - [`ExponentialBackoff`] doubling delay, capped by `max_interval`
//! - [`JitterPolicy`] optional randomization on top of either delay policy
//!
//! ## Quick wiring
//! ```text
//! TaskProcessor::retry_policy() ──► RetryTemplate::execute
//!      └─► after each non-successful attempt:
//!           - can_retry(retry_count, result, error) to decide continue/exit
//!           - next_delay(retry_count + 1) to schedule the next attempt
//! ```
//!
//! ## Defaults
//! - `TaskProcessor::retry_policy()` → `FixedDelay { max_retries: 2, delay: 50ms }`.
//! - `JitterPolicy::None`, so delay formulas are exact unless jitter is opted into.

mod backoff;
mod fixed;
mod jitter;
mod retry;

use std::{sync::Arc, time::Duration};

pub use backoff::ExponentialBackoff;
pub use fixed::FixedDelay;
pub use jitter::JitterPolicy;
pub use retry::{always, NoRetry, PolicyRef, RetryCondition, RetryPolicy};

use crate::error::TaskError;

/// Policy that never retries.
pub fn no_retry() -> PolicyRef {
    Arc::new(NoRetry)
}

/// Up to `max_retries` retries, `delay` apart, for any error.
pub fn fixed_delay(max_retries: u32, delay: Duration) -> PolicyRef {
    Arc::new(FixedDelay::new(max_retries, delay))
}

/// Up to `max_retries` retries with doubling delay capped at `max_interval`,
/// only for errors accepted by `condition`.
pub fn exponential_backoff<F>(
    max_retries: u32,
    base_delay: Duration,
    max_interval: Duration,
    condition: F,
) -> PolicyRef
where
    F: Fn(&TaskError) -> bool + Send + Sync + 'static,
{
    Arc::new(ExponentialBackoff::new(max_retries, base_delay, max_interval).retry_if(condition))
}
