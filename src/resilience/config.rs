//! # Circuit breaker configuration.
//!
//! [`CircuitBreakerConfig`] is shared by every breaker a
//! [`CircuitBreakers`](crate::CircuitBreakers) registry creates.

use std::time::Duration;

use serde::Deserialize;

use crate::{core::millis, error::RuntimeError};

/// Thresholds for a failure-rate circuit breaker.
///
/// Loaded with `serde` like [`Config`](crate::Config); `open_wait` is read from
/// `open_wait_ms`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure rate (percent, `0.0..=100.0`) at or above which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Number of most recent outcomes the failure rate is computed over.
    pub window_size: usize,

    /// Outcomes required in the window before the rate is evaluated.
    pub minimum_calls: usize,

    /// Time spent open before trial calls are let through.
    #[serde(rename = "open_wait_ms", with = "millis")]
    pub open_wait: Duration,

    /// Trial calls allowed while half-open.
    pub half_open_calls: u32,
}

impl CircuitBreakerConfig {
    /// Checks that every threshold is usable.
    ///
    /// # Errors
    /// [`RuntimeError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let invalid = |reason: &str| {
            Err(RuntimeError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return invalid("failure_rate_threshold must be in (0, 100]");
        }
        if self.window_size == 0 {
            return invalid("window_size must be greater than 0");
        }
        if self.minimum_calls == 0 || self.minimum_calls > self.window_size {
            return invalid("minimum_calls must be in 1..=window_size");
        }
        if self.half_open_calls == 0 {
            return invalid("half_open_calls must be greater than 0");
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    /// Default thresholds:
    ///
    /// - open at `50%` failures
    /// - over the last `100` outcomes, once at least `10` were seen
    /// - stay open `60s`, then allow `5` trial calls
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            window_size: 100,
            minimum_calls: 10,
            open_wait: Duration::from_secs(60),
            half_open_calls: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_minimum_above_window() {
        let cfg = CircuitBreakerConfig {
            window_size: 5,
            minimum_calls: 6,
            ..CircuitBreakerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(RuntimeError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn deserializes_partial() {
        let cfg: CircuitBreakerConfig =
            serde_json::from_str(r#"{ "open_wait_ms": 250, "window_size": 20 }"#).unwrap();
        assert_eq!(cfg.open_wait, Duration::from_millis(250));
        assert_eq!(cfg.window_size, 20);
        assert_eq!(cfg.minimum_calls, 10);
    }
}
