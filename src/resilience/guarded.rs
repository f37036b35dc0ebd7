//! # GuardedProcessor: a processor behind a circuit breaker.
//!
//! Wraps any [`TaskProcessor`] so every attempt first asks a breaker for
//! permission. Rejected attempts fail with [`TaskError::CircuitOpen`], which the
//! retry policy sees like any other error.
//!
//! ## Outcome mapping
//! ```text
//! Ok(Some(Success))            → breaker success
//! Ok(Some(Cancelled))          → breaker success (the processor chose to stop)
//! Ok(Some(Failed)) | Ok(None)  → breaker failure
//! Err(_)                       → breaker failure
//! attempt aborted (timeout)    → breaker failure (permit dropped)
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TaskError,
    policies::PolicyRef,
    resilience::circuit_breaker::CircuitBreakers,
    tasks::{ProcessOutcome, ProcessorRef, TaskContext, TaskProcessor, TaskStatus},
};

/// Processor decorator that routes attempts through a named breaker.
pub struct GuardedProcessor {
    inner: ProcessorRef,
    breakers: Arc<CircuitBreakers>,
    breaker: String,
}

impl GuardedProcessor {
    /// Guards `inner` with the breaker named after the processor.
    pub fn new(inner: ProcessorRef, breakers: Arc<CircuitBreakers>) -> Self {
        let breaker = inner.name().to_string();
        Self {
            inner,
            breakers,
            breaker,
        }
    }

    /// Uses breaker `name` instead of the processor name (e.g. one breaker per downstream).
    pub fn with_breaker(mut self, name: impl Into<String>) -> Self {
        self.breaker = name.into();
        self
    }

    /// Returns the guarded processor as a shared handle.
    pub fn into_ref(self) -> ProcessorRef {
        Arc::new(self)
    }

    /// Name of the breaker this processor goes through.
    pub fn breaker(&self) -> &str {
        &self.breaker
    }
}

#[async_trait]
impl TaskProcessor for GuardedProcessor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &TaskContext, cancel: CancellationToken) -> ProcessOutcome {
        let Some(permit) = self.breakers.get_or_create(&self.breaker).try_acquire() else {
            tracing::debug!(
                processor = %self.inner.name(),
                breaker = %self.breaker,
                task_id = ctx.task_id(),
                "attempt rejected by circuit breaker"
            );
            return Err(TaskError::CircuitOpen {
                name: self.breaker.clone(),
            });
        };

        let outcome = self.inner.process(ctx, cancel).await;
        match &outcome {
            Ok(Some(r)) if r.status() != TaskStatus::Failed => permit.success(),
            _ => permit.failure(),
        }
        outcome
    }

    fn retry_policy(&self) -> PolicyRef {
        self.inner.retry_policy()
    }

    fn timeout(&self, ctx: &TaskContext) -> Duration {
        self.inner.timeout(ctx)
    }

    fn idempotent_key(&self, ctx: &TaskContext) -> Option<Arc<str>> {
        self.inner.idempotent_key(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        resilience::{CircuitBreakerConfig, CircuitState},
        tasks::{ProcessorFn, TaskResult},
    };

    fn breakers() -> Arc<CircuitBreakers> {
        let reg = CircuitBreakers::new(CircuitBreakerConfig {
            window_size: 2,
            minimum_calls: 2,
            ..CircuitBreakerConfig::default()
        })
        .unwrap();
        Arc::new(reg)
    }

    #[tokio::test]
    async fn open_breaker_rejects_attempt() {
        let reg = breakers();
        let failing = ProcessorFn::new("remote", |_ctx, _cancel| async move {
            Err(TaskError::processing("503"))
        })
        .into_ref();
        let guarded = GuardedProcessor::new(failing, Arc::clone(&reg));
        let ctx = TaskContext::builder("t").build().unwrap();

        for _ in 0..2 {
            let err = guarded.process(&ctx, CancellationToken::new()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Processing);
        }
        assert_eq!(reg.state("remote"), CircuitState::Open);

        let err = guarded.process(&ctx, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        assert_eq!(err.to_string(), "circuit breaker \"remote\" is open");
    }

    #[tokio::test]
    async fn delegates_processor_settings() {
        let inner = ProcessorFn::new("local", |_ctx, _cancel| async move {
            TaskResult::success().into_outcome()
        })
        .with_timeout(Duration::from_secs(4))
        .into_ref();
        let guarded = GuardedProcessor::new(inner, breakers()).with_breaker("shared");
        let ctx = TaskContext::builder("t").timeout(None).build().unwrap();

        assert_eq!(guarded.name(), "local");
        assert_eq!(guarded.breaker(), "shared");
        assert_eq!(guarded.timeout(&ctx), Duration::from_secs(4));
        assert!(guarded.process(&ctx, CancellationToken::new()).await.unwrap().is_some());
    }
}
