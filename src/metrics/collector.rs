//! # Metrics collector trait.
//!
//! Provides [`MetricsCollector`] an extension point for plugging execution
//! metrics sinks into the [`RetryTemplate`](crate::RetryTemplate).
//!
//! ## Rules
//! - Called inline, after **every** attempt, from the task driving the retry loop.
//! - Calls arrive in this order: `record_execution`, `record_result`,
//!   `record_latency` (when the attempt has a duration), `record_retries`.
//! - Panics are caught and logged; they never break the retry loop.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::time::Duration;
//! use retrykit::{MetricsCollector, TaskResult};
//!
//! #[derive(Default)]
//! struct Failures(AtomicU64);
//!
//! impl MetricsCollector for Failures {
//!     fn record_execution(&self, _processor: &str) {}
//!     fn record_result(&self, _processor: &str, result: &TaskResult) {
//!         if result.is_failure() {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn record_latency(&self, _processor: &str, _latency: Duration) {}
//!     fn record_retries(&self, _processor: &str, _retries: u32) {}
//!
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

use std::time::Duration;

use crate::tasks::TaskResult;

/// Pluggable execution metrics sink.
///
/// ### Implementation requirements
/// - Keep calls cheap; they run on the retry loop's task.
/// - Handle errors internally; do not panic.
pub trait MetricsCollector: Send + Sync + 'static {
    /// One attempt of `processor` was executed.
    fn record_execution(&self, processor: &str);

    /// The normalized result of that attempt.
    fn record_result(&self, processor: &str, result: &TaskResult);

    /// How long that attempt took.
    fn record_latency(&self, processor: &str, latency: Duration);

    /// Retry count the attempt ran with (0 for the first attempt).
    fn record_retries(&self, processor: &str, retries: u32);

    /// Returns the collector name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
