//! # Failure-rate circuit breaker.
//!
//! A [`CircuitBreaker`] tracks the outcome of the last `window_size` calls and fails
//! fast once too many of them failed.
//!
//! ## States
//! ```text
//!            failure rate >= threshold
//!            (after minimum_calls)
//!   Closed ─────────────────────────────► Open
//!     ▲                                    │ open_wait elapsed
//!     │ trial success                      ▼
//!     └───────────────────────────────  HalfOpen ──► Open (trial failure)
//! ```
//!
//! ## Rules
//! - Half-open admits at most `half_open_calls` trial calls; the rest are rejected.
//! - Closing or resetting clears the window.
//! - Constructors reject configs that fail [`CircuitBreakerConfig::validate`].
//! - A [`CallPermit`] dropped without an outcome (e.g. its future was aborted)
//!   counts as a failure, so trial slots are never leaked.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::Arc,
    time::Instant,
};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;

use crate::{error::RuntimeError, resilience::config::CircuitBreakerConfig};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation; every call is allowed.
    Closed,
    /// Failing fast; calls are rejected until `open_wait` elapses.
    Open,
    /// Testing recovery with a limited number of trial calls.
    HalfOpen,
}

impl CircuitState {
    /// Returns a short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Errors from [`CircuitBreakers::call`].
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker rejected the call without running it.
    #[error("circuit breaker {name:?} is open")]
    Open {
        /// Breaker name.
        name: String,
    },

    /// The call ran and failed; the failure was recorded.
    #[error("operation failed: {0}")]
    Failed(E),
}

/// Point-in-time counters of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Calls that ran to an outcome since creation or the last reset.
    pub total_calls: u64,
    /// Of those, how many failed.
    pub failed_calls: u64,
    /// Calls rejected without running.
    pub rejected_calls: u64,
    /// Failure rate (percent) over the current window.
    pub window_failure_rate: f64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// `true` = failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_calls: u32,
    total_calls: u64,
    failed_calls: u64,
    rejected_calls: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::new(),
            opened_at: None,
            trial_calls: 0,
            total_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failed = self.window.iter().filter(|f| **f).count();
        failed as f64 * 100.0 / self.window.len() as f64
    }
}

/// Single named breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// # Errors
    /// [`RuntimeError::InvalidConfig`] if `config` fails [`CircuitBreakerConfig::validate`].
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self::with_valid_config(name.into(), config))
    }

    fn with_valid_config(name: String, config: CircuitBreakerConfig) -> Self {
        tracing::debug!(
            breaker = %name,
            failure_rate_threshold = config.failure_rate_threshold,
            window_size = config.window_size,
            open_wait_ms = config.open_wait.as_millis() as u64,
            "circuit breaker created"
        );
        Self {
            name,
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. Does not advance `Open` to `HalfOpen`; only call attempts do.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Asks for permission to run one call.
    ///
    /// Returns `None` when the breaker rejects the call.
    pub fn try_acquire(self: &Arc<Self>) -> Option<CallPermit> {
        let mut inner = self.inner.lock();
        let allowed = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let waited = inner
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.config.open_wait);
                if waited {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_calls = 1;
                    tracing::info!(breaker = %self.name, "circuit breaker half-open");
                }
                waited
            }
            CircuitState::HalfOpen => {
                if inner.trial_calls < self.config.half_open_calls {
                    inner.trial_calls += 1;
                    true
                } else {
                    false
                }
            }
        };
        if !allowed {
            inner.rejected_calls += 1;
            return None;
        }
        Some(CallPermit {
            breaker: Arc::clone(self),
            done: false,
        })
    }

    /// Returns to `Closed` with an empty window and zeroed counters.
    pub fn reset(&self) {
        *self.inner.lock() = Inner::new();
        tracing::info!(breaker = %self.name, "circuit breaker reset");
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            total_calls: inner.total_calls,
            failed_calls: inner.failed_calls,
            rejected_calls: inner.rejected_calls,
            window_failure_rate: inner.failure_rate(),
        }
    }

    fn record(&self, failed: bool) {
        let mut inner = self.inner.lock();
        inner.total_calls += 1;
        if failed {
            inner.failed_calls += 1;
        }

        match inner.state {
            CircuitState::HalfOpen if failed => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_calls = 0;
                tracing::warn!(breaker = %self.name, "trial call failed; circuit breaker re-opened");
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.window.clear();
                inner.opened_at = None;
                inner.trial_calls = 0;
                tracing::info!(breaker = %self.name, "circuit breaker closed");
            }
            CircuitState::Closed => {
                inner.window.push_back(failed);
                while inner.window.len() > self.config.window_size.max(1) {
                    inner.window.pop_front();
                }
                if failed && inner.window.len() >= self.config.minimum_calls {
                    let rate = inner.failure_rate();
                    if rate >= self.config.failure_rate_threshold {
                        inner.state = CircuitState::Open;
                        inner.opened_at = Some(Instant::now());
                        tracing::warn!(
                            breaker = %self.name,
                            failure_rate = rate,
                            window = inner.window.len(),
                            "circuit breaker opened"
                        );
                    }
                }
            }
            // Outcome of a call admitted before another call opened the breaker.
            CircuitState::Open => {}
        }
    }
}

/// Permission to run one call through a breaker.
///
/// Report the outcome with [`success`](Self::success) or [`failure`](Self::failure);
/// dropping the permit without reporting records a failure.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    done: bool,
}

impl CallPermit {
    pub fn success(mut self) {
        self.done = true;
        self.breaker.record(false);
    }

    pub fn failure(mut self) {
        self.done = true;
        self.breaker.record(true);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.done {
            self.breaker.record(true);
        }
    }
}

/// Registry of named breakers sharing one configuration.
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    /// Creates an empty registry; breakers are created on first use.
    ///
    /// # Errors
    /// [`RuntimeError::InvalidConfig`] if `config` fails [`CircuitBreakerConfig::validate`].
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, RuntimeError> {
        if let Err(err) = config.validate() {
            tracing::warn!(?config, error = %err, "circuit breaker config rejected");
            return Err(err);
        }
        tracing::info!(?config, "circuit breaker registry created");
        Ok(Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the breaker for `name`, creating it if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(cb) = self.breakers.read().get(name) {
            return Arc::clone(cb);
        }
        let mut map = self.breakers.write();
        Arc::clone(
            map.entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::with_valid_config(name.to_string(), self.config.clone()))),
        )
    }

    /// State of `name`; `Closed` when no breaker exists yet.
    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers
            .read()
            .get(name)
            .map_or(CircuitState::Closed, |cb| cb.state())
    }

    /// Resets `name` if it exists.
    pub fn reset(&self, name: &str) {
        if let Some(cb) = self.breakers.read().get(name) {
            cb.reset();
        }
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut all: Vec<_> = self.breakers.read().values().map(|cb| cb.snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Runs `operation` through breaker `name`.
    ///
    /// # Errors
    /// - [`CircuitBreakerError::Open`] without running `operation` when the breaker rejects;
    /// - [`CircuitBreakerError::Failed`] when `operation` fails (the failure is recorded).
    pub async fn call<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(permit) = self.get_or_create(name).try_acquire() else {
            return Err(CircuitBreakerError::Open {
                name: name.to_string(),
            });
        };
        match operation().await {
            Ok(v) => {
                permit.success();
                Ok(v)
            }
            Err(e) => {
                permit.failure();
                Err(CircuitBreakerError::Failed(e))
            }
        }
    }

    /// Runs `operation` through breaker `name`, answering with `fallback` when the
    /// breaker rejects or the operation fails.
    pub async fn call_with_fallback<F, Fut, T, E, FB>(&self, name: &str, operation: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        FB: FnOnce() -> T,
    {
        match self.call(name, operation).await {
            Ok(v) => v,
            Err(CircuitBreakerError::Open { .. }) => {
                tracing::debug!(breaker = %name, "circuit breaker open; using fallback");
                fallback()
            }
            Err(CircuitBreakerError::Failed(e)) => {
                tracing::debug!(breaker = %name, error = %e, "operation failed; using fallback");
                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 50.0,
            window_size: 4,
            minimum_calls: 4,
            open_wait: Duration::from_millis(20),
            half_open_calls: 2,
        }
    }

    async fn fail(reg: &CircuitBreakers, name: &str) -> Result<(), CircuitBreakerError<&'static str>> {
        reg.call(name, || async { Err::<(), _>("boom") }).await
    }

    async fn succeed(reg: &CircuitBreakers, name: &str) -> Result<(), CircuitBreakerError<&'static str>> {
        reg.call(name, || async { Ok::<(), &'static str>(()) }).await
    }

    #[tokio::test]
    async fn opens_after_minimum_calls() {
        let reg = CircuitBreakers::new(config()).unwrap();
        assert!(succeed(&reg, "db").await.is_ok());
        assert!(succeed(&reg, "db").await.is_ok());
        assert!(matches!(fail(&reg, "db").await, Err(CircuitBreakerError::Failed("boom"))));
        assert_eq!(reg.state("db"), CircuitState::Closed);

        assert!(fail(&reg, "db").await.is_err());
        assert_eq!(reg.state("db"), CircuitState::Open);
        assert!(matches!(
            succeed(&reg, "db").await,
            Err(CircuitBreakerError::Open { .. })
        ));
        assert_eq!(reg.get_or_create("db").snapshot().rejected_calls, 1);
    }

    #[tokio::test]
    async fn half_open_success_closes() {
        let reg = CircuitBreakers::new(config()).unwrap();
        for _ in 0..4 {
            let _ = fail(&reg, "api").await;
        }
        assert_eq!(reg.state("api"), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(succeed(&reg, "api").await.is_ok());
        assert_eq!(reg.state("api"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let reg = CircuitBreakers::new(config()).unwrap();
        for _ in 0..4 {
            let _ = fail(&reg, "api").await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = fail(&reg, "api").await;
        assert_eq!(reg.state("api"), CircuitState::Open);
    }

    #[test]
    fn half_open_limits_trial_calls() {
        let cb = Arc::new(CircuitBreaker::new(
            "x",
            CircuitBreakerConfig {
                open_wait: Duration::ZERO,
                ..config()
            },
        )
        .unwrap());
        for _ in 0..4 {
            cb.try_acquire().unwrap().failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let first = cb.try_acquire().unwrap();
        let second = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_none());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        drop(first);
        assert_eq!(cb.state(), CircuitState::Open);
        second.success();
    }

    #[tokio::test]
    async fn fallback_and_reset() {
        let reg = CircuitBreakers::new(config()).unwrap();
        let v = reg
            .call_with_fallback("svc", || async { Err::<u32, _>("down") }, || 7)
            .await;
        assert_eq!(v, 7);

        for _ in 0..4 {
            let _ = fail(&reg, "svc").await;
        }
        assert_eq!(reg.state("svc"), CircuitState::Open);
        reg.reset("svc");
        assert_eq!(reg.state("svc"), CircuitState::Closed);
        assert_eq!(reg.state("unknown"), CircuitState::Closed);
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = CircuitBreakerConfig {
            window_size: 3,
            minimum_calls: 10,
            ..config()
        };
        let err = CircuitBreakers::new(cfg.clone()).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::InvalidConfig {
                reason: "minimum_calls must be in 1..=window_size".into()
            }
        );
        assert_eq!(err.as_label(), "runtime_invalid_config");
        assert!(CircuitBreaker::new("db", cfg).is_err());
    }
}
