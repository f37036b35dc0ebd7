//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the retry runtime.
//!
//! Config is consumed by [`RetryTemplate::builder`](crate::RetryTemplate::builder),
//! which sizes the [`WorkerPool`](crate::WorkerPool) from it and keeps the timeout
//! and grace settings for the retry loop.
//!
//! ## Sentinel values
//! - `max_workers = 0` → unlimited (no semaphore created)
//! - `default_timeout = 0s` → no fallback timeout
//! - `shutdown_grace = 0s` → `shutdown_graceful` does not wait for in-flight attempts
//!
//! ## Loading
//! `Config` derives `Deserialize`; durations are read as milliseconds and every
//! field is optional:
//! ```rust
//! use retrykit::{Config, Saturation};
//!
//! let cfg: Config = serde_json::from_str(
//!     r#"{ "max_workers": 8, "saturation": "reject", "default_timeout_ms": 2000 }"#,
//! ).unwrap();
//! assert_eq!(cfg.worker_limit(), Some(8));
//! assert_eq!(cfg.saturation, Saturation::Reject);
//! ```

use std::time::Duration;

use serde::Deserialize;

/// What a timed attempt does when every worker slot is taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Saturation {
    /// Wait for a slot; the wait counts against the attempt's timeout.
    #[default]
    Wait,
    /// Fail the attempt immediately with [`TaskError::Rejected`](crate::TaskError::Rejected).
    Reject,
}

/// Global configuration for the retry runtime.
///
/// ## Field semantics
/// - `max_workers`: concurrent timed attempts across all executions (`0` = unlimited)
/// - `saturation`: behavior when `max_workers` is reached
/// - `default_timeout`: used when neither context nor processor sets a timeout (`0s` = none)
/// - `shutdown_grace`: how long `shutdown_graceful` waits for in-flight attempts
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of timed attempts running at once.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` attempts hold a worker slot simultaneously
    pub max_workers: usize,

    /// Behavior when the pool is full.
    pub saturation: Saturation,

    /// Fallback per-attempt timeout.
    ///
    /// Applied only when the context defers (`timeout = None`) and the processor
    /// reports zero.
    #[serde(rename = "default_timeout_ms", with = "millis")]
    pub default_timeout: Duration,

    /// Maximum time [`RetryTemplate::shutdown_graceful`](crate::RetryTemplate::shutdown_graceful)
    /// waits for running attempts to release their slots.
    #[serde(rename = "shutdown_grace_ms", with = "millis")]
    pub shutdown_grace: Duration,
}

impl Config {
    /// Returns the worker limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent timed attempts
    #[inline]
    pub fn worker_limit(&self) -> Option<usize> {
        if self.max_workers == 0 {
            None
        } else {
            Some(self.max_workers)
        }
    }

    /// Returns the fallback timeout as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.default_timeout.is_zero() {
            None
        } else {
            Some(self.default_timeout)
        }
    }

    /// Returns the shutdown grace as an `Option` (`None` = don't wait).
    #[inline]
    pub fn grace(&self) -> Option<Duration> {
        if self.shutdown_grace.is_zero() {
            None
        } else {
            Some(self.shutdown_grace)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_workers = 256` (bounded pool)
    /// - `saturation = Wait` (backpressure)
    /// - `default_timeout = 0s` (none)
    /// - `shutdown_grace = 30s`
    fn default() -> Self {
        Self {
            max_workers: 256,
            saturation: Saturation::Wait,
            default_timeout: Duration::ZERO,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(de: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(de).map(Duration::from_millis)
    }
}
