//! # Function-backed processor (`ProcessorFn`)
//!
//! [`ProcessorFn`] wraps a closure `F: Fn(TaskContext, CancellationToken) -> Fut`,
//! producing a fresh future per attempt. There is no hidden mutation between
//! attempts; shared state must be captured explicitly (e.g. an `Arc<AtomicU32>`).
//!
//! The retry policy and fallback timeout can be overridden with
//! [`ProcessorFn::with_policy`] and [`ProcessorFn::with_timeout`].
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use retrykit::{policies, ProcessorFn, ProcessorRef, TaskContext, TaskResult};
//!
//! let p: ProcessorRef = ProcessorFn::new("echo", |ctx: TaskContext, _cancel: CancellationToken| async move {
//!     TaskResult::success().error_message(ctx.task_id()).into_outcome()
//! })
//! .with_policy(policies::no_retry())
//! .into_ref();
//!
//! assert_eq!(p.name(), "echo");
//! ```

use std::{borrow::Cow, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    policies::PolicyRef,
    tasks::{
        context::TaskContext,
        processor::{ProcessOutcome, ProcessorRef, TaskProcessor},
    },
};

/// Function-backed processor implementation.
pub struct ProcessorFn<F> {
    name: Cow<'static, str>,
    f: F,
    policy: Option<PolicyRef>,
    timeout: Option<Duration>,
}

impl<F> ProcessorFn<F> {
    /// Overrides the default retry policy.
    pub fn with_policy(mut self, policy: PolicyRef) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the timeout used when the context defers (`TaskContext::timeout() == None`).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<F, Fut> ProcessorFn<F>
where
    F: Fn(TaskContext, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessOutcome> + Send + 'static,
{
    /// Creates a new function-backed processor.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            policy: None,
            timeout: None,
        }
    }

    /// Returns the processor as a shared handle (`Arc<dyn TaskProcessor>`).
    pub fn into_ref(self) -> ProcessorRef {
        Arc::new(self)
    }
}

#[async_trait]
impl<F, Fut> TaskProcessor for ProcessorFn<F>
where
    F: Fn(TaskContext, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessOutcome> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: &TaskContext, cancel: CancellationToken) -> ProcessOutcome {
        (self.f)(ctx.clone(), cancel).await
    }

    fn retry_policy(&self) -> PolicyRef {
        match &self.policy {
            Some(p) => Arc::clone(p),
            None => Arc::new(crate::policies::FixedDelay::default()),
        }
    }

    fn timeout(&self, ctx: &TaskContext) -> Duration {
        ctx.timeout()
            .or(self.timeout)
            .unwrap_or(Duration::ZERO)
    }
}
