//! # RetryTemplate: runs a processor until it succeeds, is vetoed, or is interrupted.
//!
//! The [`RetryTemplate`] owns a [`WorkerPool`] for timed attempts, a [`CollectorSet`]
//! for metrics, and a runtime cancellation token used for shutdown.
//!
//! ## Architecture
//! ```text
//! execute(processor, ctx)
//!   ├─► shut down? → Err(RuntimeError::Shutdown)
//!   policy = processor.retry_policy(); retry = ctx.retry_count
//!   loop {
//!     ├─► run_once(processor, current, effective_timeout, pool)
//!     │      └─ Ok(Some) | Ok(None) | Err(Timeout) | Err(Interrupted) | Err(other)
//!     ├─► normalize / synthesize TaskResult
//!     ├─► collectors.record(name, &result, retry)
//!     ├─► Success | processor Cancelled | Interrupted → return
//!     ├─► Failed | Timeout → policy.can_retry(retry, &result, err)? else return
//!     ├─► retry += 1; current = current.with_retry_count(retry)
//!     └─► sleep(policy.next_delay(retry))   (interruptible)
//!   }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**; one template may serve many concurrent executions.
//! - Processor errors, panics and timeouts never escape; every path yields a [`TaskResult`].
//! - Interruptions (template shutdown, caller token) end the loop at once with a
//!   `Cancelled` result carrying [`TaskError::Interrupted`]; the policy is not consulted.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use retrykit::{policies, Config, ProcessorFn, RetryTemplate, TaskContext, TaskError, TaskResult};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let template = RetryTemplate::new(Config::default());
//!     let calls = Arc::new(AtomicU32::new(0));
//!
//!     let counter = Arc::clone(&calls);
//!     let flaky = ProcessorFn::new("flaky", move |_ctx: TaskContext, _cancel: CancellationToken| {
//!         let counter = Arc::clone(&counter);
//!         async move {
//!             if counter.fetch_add(1, Ordering::SeqCst) < 2 {
//!                 return Err(TaskError::processing("not yet"));
//!             }
//!             TaskResult::success().into_outcome()
//!         }
//!     })
//!     .with_policy(policies::fixed_delay(3, Duration::from_millis(5)))
//!     .into_ref();
//!
//!     let ctx = TaskContext::builder("job-1").build()?;
//!     let result = template.execute(&flaky, &ctx).await?;
//!     assert!(result.is_success());
//!     assert_eq!(calls.load(Ordering::SeqCst), 3);
//!     Ok(())
//! }
//! ```

use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        builder::RetryTemplateBuilder,
        config::Config,
        pool::WorkerPool,
        runner::{run_once, Interrupt},
    },
    error::{ErrorKind, RuntimeError, TaskError},
    metrics::CollectorSet,
    tasks::{ProcessOutcome, ProcessorRef, TaskContext, TaskResult, TaskResultBuilder, TaskStatus},
};

/// What the loop does with a classified attempt.
enum Verdict {
    /// Return the result as is.
    Finish,
    /// Ask the policy, passing the error (if any).
    Consult(Option<TaskError>),
}

/// Retry orchestrator.
pub struct RetryTemplate {
    cfg: Config,
    pool: WorkerPool,
    collectors: CollectorSet,
    runtime_token: CancellationToken,
}

impl RetryTemplate {
    /// Creates a template with a pool sized from `cfg` and no collectors.
    pub fn new(cfg: Config) -> Self {
        Self::builder(cfg).build()
    }

    /// Starts a [`RetryTemplateBuilder`] for injecting collectors or a shared pool.
    pub fn builder(cfg: Config) -> RetryTemplateBuilder {
        RetryTemplateBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: Config, pool: WorkerPool, collectors: CollectorSet) -> Self {
        tracing::info!(
            max_workers = ?pool.limit(),
            saturation = ?pool.saturation(),
            collectors = collectors.len(),
            "retry template created"
        );
        Self {
            cfg,
            pool,
            collectors,
            runtime_token: CancellationToken::new(),
        }
    }

    /// Runs `processor` under its retry policy until a terminal result.
    ///
    /// # Errors
    /// [`RuntimeError::Shutdown`] if the template was shut down before the call.
    /// Per-attempt failures never surface here; they are carried by the result.
    pub async fn execute(
        &self,
        processor: &ProcessorRef,
        ctx: &TaskContext,
    ) -> Result<TaskResult, RuntimeError> {
        self.execute_with_cancel(processor, ctx, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but `cancel` interrupts the execution.
    ///
    /// Cancelling the token during an attempt, a pool wait or a backoff sleep ends
    /// the loop with a `Cancelled` result carrying [`TaskError::Interrupted`].
    pub async fn execute_with_cancel(
        &self,
        processor: &ProcessorRef,
        ctx: &TaskContext,
        cancel: CancellationToken,
    ) -> Result<TaskResult, RuntimeError> {
        if self.is_shutdown() {
            return Err(RuntimeError::Shutdown);
        }

        let interrupt = Interrupt::new(self.runtime_token.clone(), cancel);
        let policy = processor.retry_policy();
        let name = processor.name();
        let mut current = ctx.clone();
        let mut retry = current.retry_count();

        loop {
            let timeout = self.effective_timeout(processor, &current);
            tracing::debug!(
                processor = %name,
                task_id = current.task_id(),
                retry,
                timeout_ms = timeout.as_millis() as u64,
                "attempt starting"
            );

            let started_at = SystemTime::now();
            let clock = Instant::now();
            let outcome = run_once(processor, &current, timeout, &self.pool, &interrupt).await;
            let (result, verdict) = classify(processor, &current, outcome, started_at, clock);

            self.collectors.record(name, &result, retry);
            tracing::debug!(
                processor = %name,
                task_id = current.task_id(),
                retry,
                status = result.status().as_label(),
                "attempt finished"
            );

            let err = match verdict {
                Verdict::Finish => return Ok(result),
                Verdict::Consult(err) => err,
            };
            if !policy.can_retry(retry, &result, err.as_ref()) {
                tracing::debug!(processor = %name, task_id = current.task_id(), retry, "retry vetoed");
                return Ok(result);
            }

            retry = retry.saturating_add(1);
            current = current.with_retry_count(retry);
            let delay = policy.next_delay(retry);
            tracing::debug!(
                processor = %name,
                task_id = current.task_id(),
                retry,
                delay_ms = delay.as_millis() as u64,
                "retry scheduled"
            );

            if delay.is_zero() {
                if let Some(reason) = interrupt.reason() {
                    return Ok(interrupted(&current, reason));
                }
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                reason = interrupt.wait() => {
                    tracing::warn!(processor = %name, task_id = current.task_id(), reason, "interrupted during backoff");
                    return Ok(interrupted(&current, reason));
                }
            }
        }
    }

    /// Stops the template: running attempts see their tokens cancelled, waiters
    /// wake up, and later `execute` calls fail with [`RuntimeError::Shutdown`].
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.runtime_token.is_cancelled() {
            return;
        }
        self.runtime_token.cancel();
        self.pool.shutdown();
        tracing::info!("retry template shut down");
    }

    /// Shuts down, then waits up to [`Config::shutdown_grace`] for workers to exit.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] if workers are still running after the grace period.
    pub async fn shutdown_graceful(&self) -> Result<(), RuntimeError> {
        self.shutdown();
        match self.cfg.grace() {
            Some(grace) => self.pool.shutdown_graceful(grace).await,
            None => Ok(()),
        }
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    /// The pool used for timed attempts.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The configuration this template was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Context timeout if set, else the processor's, else the configured fallback.
    fn effective_timeout(&self, processor: &ProcessorRef, ctx: &TaskContext) -> Duration {
        if let Some(t) = ctx.timeout() {
            return t;
        }
        let t = processor.timeout(ctx);
        if t.is_zero() {
            self.cfg.default_timeout().unwrap_or(Duration::ZERO)
        } else {
            t
        }
    }
}

impl Default for RetryTemplate {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Turns one attempt outcome into a normalized result and a loop verdict.
fn classify(
    processor: &ProcessorRef,
    ctx: &TaskContext,
    outcome: ProcessOutcome,
    started_at: SystemTime,
    clock: Instant,
) -> (TaskResult, Verdict) {
    match outcome {
        Ok(Some(result)) => {
            let result = normalize(ctx, result, started_at, clock);
            let verdict = match result.status() {
                TaskStatus::Success | TaskStatus::Cancelled => Verdict::Finish,
                TaskStatus::Failed => Verdict::Consult(None),
            };
            (result, verdict)
        }
        Ok(None) => {
            let result = synthesize(ctx, TaskStatus::Failed, TaskError::NullResult)
                .start_time(started_at)
                .duration(Duration::ZERO)
                .build();
            (result, Verdict::Consult(Some(TaskError::NullResult)))
        }
        Err(err) => {
            let status = if err.is_cancellation() {
                TaskStatus::Cancelled
            } else {
                TaskStatus::Failed
            };
            match err.kind() {
                ErrorKind::Timeout => tracing::warn!(
                    processor = %processor.name(),
                    task_id = ctx.task_id(),
                    error = %err,
                    "attempt timed out"
                ),
                ErrorKind::Interrupted => tracing::warn!(
                    processor = %processor.name(),
                    task_id = ctx.task_id(),
                    error = %err,
                    "attempt interrupted"
                ),
                _ => {}
            }
            let verdict = match err.kind() {
                ErrorKind::Interrupted => Verdict::Finish,
                _ => Verdict::Consult(Some(err.clone())),
            };
            let result = synthesize(ctx, status, err)
                .start_time(started_at)
                .duration(clock.elapsed())
                .build();
            (result, verdict)
        }
    }
}

/// Fills timing and idempotency fields the processor left empty.
///
/// A missing key is taken from the context, the same source synthesized results use.
fn normalize(
    ctx: &TaskContext,
    result: TaskResult,
    started_at: SystemTime,
    clock: Instant,
) -> TaskResult {
    let start_time = result.start_time().unwrap_or(started_at);
    let duration = result.duration().unwrap_or_else(|| match result.start_time() {
        Some(t) => SystemTime::now()
            .duration_since(t)
            .unwrap_or_else(|_| clock.elapsed()),
        None => clock.elapsed(),
    });
    let key = match result.idempotent_key() {
        Some(k) => Some(k.into()),
        None => ctx.idempotent_key_arc(),
    };
    let hit = result.idempotent_hit() || key.is_some();

    result
        .to_builder()
        .start_time(start_time)
        .duration(duration)
        .idempotent_key_opt(key)
        .idempotent_hit(hit)
        .build()
}

/// Result for an attempt the processor did not produce itself.
fn synthesize(ctx: &TaskContext, status: TaskStatus, err: TaskError) -> TaskResultBuilder {
    let key = ctx.idempotent_key_arc();
    let hit = key.is_some();
    TaskResult::builder(status)
        .error_message(err.to_string())
        .error(err)
        .idempotent_key_opt(key)
        .idempotent_hit(hit)
}

/// Terminal result for an interruption outside of an attempt.
fn interrupted(ctx: &TaskContext, reason: &str) -> TaskResult {
    synthesize(ctx, TaskStatus::Cancelled, TaskError::interrupted(reason))
        .start_time(SystemTime::now())
        .duration(Duration::ZERO)
        .build()
}
