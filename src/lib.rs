//! # retrykit
//!
//! **retrykit** runs a unit of async work under a timeout, decides whether and
//! when to retry it, and hands back exactly one final [`TaskResult`].
//!
//! It is a single-process, single-invocation primitive: it does not schedule
//! when work first runs and does not persist anything. Hosts build a
//! [`TaskContext`], supply a [`TaskProcessor`], and call [`RetryTemplate::execute`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐        ┌──────────────────────────────┐
//!     │ TaskContext  │        │ TaskProcessor                │
//!     │ (task id,    │        │ - process(ctx, cancel)       │
//!     │  key, retry, │        │ - retry_policy() ──► RetryPolicy
//!     │  timeout)    │        │ - timeout(ctx), idempotent_key(ctx)
//!     └──────┬───────┘        └──────────────┬───────────────┘
//!            ▼                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RetryTemplate (retry orchestrator)                               │
//! │  - WorkerPool (bounded slots for timed attempts)                  │
//! │  - CollectorSet (fans out to MetricsCollectors)                   │
//! │  - runtime token (shutdown)                                       │
//! └──────┬─────────────────────────────────────────────────┬──────────┘
//!        ▼                                                 ▼
//!   run_once(attempt) ──► TaskResult ──► MetricsCollector(s)
//!        │
//!        └─ policy.can_retry? ──► sleep(next_delay) ──► next attempt
//! ```
//!
//! ### Lifecycle
//! ```text
//! execute(processor, ctx)
//!
//! loop {
//!   ├─► run_once(processor, ctx_with_retry, effective_timeout)
//!   │       │
//!   │       ├─ Ok(Some(result)) ──► normalize (timing, idempotency)
//!   │       │                        ├─ Success / Cancelled ─► return
//!   │       │                        └─ Failed ─► consult policy
//!   │       ├─ Ok(None)         ──► Failed "Task returned null result" ─► consult policy
//!   │       ├─ Err(Timeout)     ──► Cancelled "Task timed out after ..." ─► consult policy
//!   │       ├─ Err(Interrupted) ──► Cancelled ─► return
//!   │       └─ Err(other)       ──► Failed (error text) ─► consult policy
//!   │
//!   ├─► record metrics for the attempt
//!   └─► policy allows?
//!          ├─ no  ─► return result
//!          └─ yes ─► retry += 1, sleep(next_delay(retry)) (interruptible), continue
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                               |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------------|
//! | **Execution**     | Timeouts, retries, interruption, bounded worker pool.          | [`RetryTemplate`], [`WorkerPool`]                |
//! | **Tasks**         | Per-attempt context and result, processors as traits or fns.   | [`TaskContext`], [`TaskResult`], [`ProcessorFn`] |
//! | **Policies**      | Whether and when to retry.                                     | [`RetryPolicy`], [`FixedDelay`], [`ExponentialBackoff`] |
//! | **Metrics**       | Per-attempt hooks and an in-memory collector.                  | [`MetricsCollector`], [`InMemoryMetrics`]        |
//! | **Registry**      | Look processors up by name and version.                        | [`ProcessorRegistry`]                            |
//! | **Resilience**    | Circuit breakers in front of processors.                       | [`CircuitBreakers`], [`GuardedProcessor`]        |
//! | **Errors**        | Typed errors for the runtime and for attempts.                 | [`TaskError`], [`RuntimeError`]                  |
//! | **Configuration** | Centralized runtime settings.                                  | [`Config`], [`CircuitBreakerConfig`]             |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], a `tracing`-backed collector.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use retrykit::{policies, Config, InMemoryMetrics, ProcessorFn, RetryTemplate, TaskContext, TaskResult};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let metrics = Arc::new(InMemoryMetrics::new());
//!     let template = RetryTemplate::builder(Config::default())
//!         .with_collector(metrics.clone())
//!         .build();
//!
//!     let hello = ProcessorFn::new("hello", |ctx: TaskContext, _cancel: CancellationToken| async move {
//!         println!("hello from {}", ctx.task_id());
//!         TaskResult::success().into_outcome()
//!     })
//!     .with_policy(policies::fixed_delay(2, Duration::from_millis(10)))
//!     .into_ref();
//!
//!     let ctx = TaskContext::builder("greeting-1").idempotent_key("greeting-1").build()?;
//!     let result = template.execute(&hello, &ctx).await?;
//!
//!     assert!(result.is_success());
//!     assert!(result.idempotent_hit());
//!     assert_eq!(metrics.processor("hello").map(|m| m.executions), Some(1));
//!
//!     template.shutdown();
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod metrics;
mod processors;
mod resilience;
mod tasks;

pub mod policies;

// ---- Public re-exports ----

pub use crate::core::{Config, RetryTemplate, RetryTemplateBuilder, Saturation, WorkerPool};
pub use error::{BoxError, ErrorKind, RuntimeError, TaskError};
pub use metrics::{CollectorSet, InMemoryMetrics, MetricsCollector, ProcessorMetrics};
pub use policies::{ExponentialBackoff, FixedDelay, JitterPolicy, NoRetry, PolicyRef, RetryPolicy};
pub use processors::{ProcessorInfo, ProcessorRegistry, ProcessorStats, DEFAULT_VERSION};
pub use resilience::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerSnapshot,
    CircuitBreakers, CircuitState, GuardedProcessor,
};
pub use tasks::{
    ProcessOutcome, ProcessorFn, ProcessorRef, TaskContext, TaskContextBuilder, TaskProcessor,
    TaskResult, TaskResultBuilder, TaskStatus, DEFAULT_TIMEOUT,
};

// Optional: expose a simple built-in logging collector.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use metrics::LogWriter;
