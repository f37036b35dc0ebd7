//! # Retry policy contract.
//!
//! [`RetryPolicy`] answers two questions for the template:
//! - *may* the task be retried after this result? ([`RetryPolicy::can_retry`])
//! - *how long* to wait before the next attempt? ([`RetryPolicy::next_delay`])
//!
//! Policies are stateless and shared as [`PolicyRef`]. The rule "a cancelled
//! result is never retried" lives in the built-in policies, not in the template,
//! so a custom policy may choose to retry after a timeout.

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    error::TaskError,
    tasks::{TaskResult, TaskStatus},
};

/// Shared handle to a retry policy.
pub type PolicyRef = Arc<dyn RetryPolicy>;

/// Predicate deciding whether an error is worth another attempt.
pub type RetryCondition = Arc<dyn Fn(&TaskError) -> bool + Send + Sync>;

/// Strategy deciding retry eligibility and inter-attempt delay.
pub trait RetryPolicy: Send + Sync + 'static {
    /// Whether another attempt may follow.
    ///
    /// - `retry_count`: retries already performed (0 after the first attempt)
    /// - `last`: the attempt's normalized result
    /// - `error`: the raw error when the attempt raised one; `None` when the
    ///   processor returned a result on its own
    fn can_retry(&self, retry_count: u32, last: &TaskResult, error: Option<&TaskError>) -> bool;

    /// Delay to wait before the attempt with the given retry count.
    fn next_delay(&self, retry_count: u32) -> Duration;
}

/// Never retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn can_retry(&self, _retry_count: u32, _last: &TaskResult, _error: Option<&TaskError>) -> bool {
        false
    }

    fn next_delay(&self, _retry_count: u32) -> Duration {
        Duration::ZERO
    }
}

/// Condition that accepts every error.
pub fn always() -> RetryCondition {
    Arc::new(|_| true)
}

/// Gating shared by the delay-based policies.
///
/// Refuses once `retry_count` reaches `max_retries`, refuses cancelled results,
/// otherwise defers to `condition` when an error is present.
pub(crate) fn gate(
    retry_count: u32,
    max_retries: u32,
    last: &TaskResult,
    error: Option<&TaskError>,
    condition: &RetryCondition,
) -> bool {
    if retry_count >= max_retries {
        return false;
    }
    if last.status() == TaskStatus::Cancelled {
        return false;
    }
    match error {
        None => true,
        Some(e) => condition(e),
    }
}

/// Debug helper for structs holding a [`RetryCondition`].
pub(crate) struct ConditionDebug;

impl fmt::Debug for ConditionDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<fn>")
    }
}
