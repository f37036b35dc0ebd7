//! # Task processor abstraction.
//!
//! A [`TaskProcessor`] is the unit of work run by the
//! [`RetryTemplate`](crate::RetryTemplate). It has a stable [`name`](TaskProcessor::name)
//! and an async [`process`](TaskProcessor::process) method that receives the
//! per-attempt [`TaskContext`] and a [`CancellationToken`].
//!
//! The token is cancelled when the attempt times out or the template is shut
//! down. The template stops *waiting* on time either way; a timed attempt is also
//! dropped at its next `.await`, while blocking code runs until it returns.
//!
//! The common handle type is [`ProcessorRef`], an `Arc<dyn TaskProcessor>`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TaskError,
    policies::{FixedDelay, PolicyRef},
    tasks::{context::TaskContext, result::TaskResult},
};

/// What one call to [`TaskProcessor::process`] produces.
///
/// `Ok(None)` means the processor finished without a result; the template turns
/// it into a `Failed` result ("Task returned null result").
pub type ProcessOutcome = Result<Option<TaskResult>, TaskError>;

/// Shared handle to a processor.
pub type ProcessorRef = Arc<dyn TaskProcessor>;

/// # Asynchronous, cancelable unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use retrykit::{ProcessOutcome, TaskContext, TaskError, TaskProcessor, TaskResult};
///
/// struct Ping;
///
/// #[async_trait]
/// impl TaskProcessor for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     async fn process(&self, ctx: &TaskContext, cancel: CancellationToken) -> ProcessOutcome {
///         if cancel.is_cancelled() {
///             return Err(TaskError::processing("cancelled before start"));
///         }
///         TaskResult::success().error_message(ctx.task_id()).into_outcome()
///     }
/// }
/// ```
#[async_trait]
pub trait TaskProcessor: Send + Sync + 'static {
    /// Returns a stable identifier used in logs and metrics.
    fn name(&self) -> &str;

    /// Runs one attempt.
    ///
    /// Timed attempts run on a worker thread of their own, so blocking code still
    /// times out, but it keeps that thread until it returns; prefer async I/O or
    /// `tokio::task::spawn_blocking` for long synchronous work. Untimed attempts
    /// run in the caller's task.
    async fn process(&self, ctx: &TaskContext, cancel: CancellationToken) -> ProcessOutcome;

    /// Retry policy for this processor.
    ///
    /// Default: two retries, 50ms apart, for any error.
    fn retry_policy(&self) -> PolicyRef {
        Arc::new(FixedDelay::default())
    }

    /// Processor-specific timeout, used when the context does not carry one.
    ///
    /// Default: the context timeout, or zero (no timeout).
    fn timeout(&self, ctx: &TaskContext) -> Duration {
        ctx.timeout().unwrap_or(Duration::ZERO)
    }

    /// Idempotency key this processor associates with an attempt.
    ///
    /// Default: the context's key. The template fills a missing result key from
    /// the context, never from this method, so every attempt of one execution
    /// carries the same key; a processor that wants its own key sets it on the
    /// [`TaskResult`] it returns.
    fn idempotent_key(&self, ctx: &TaskContext) -> Option<Arc<str>> {
        ctx.idempotent_key_arc()
    }
}
