//! # Run a single attempt of a processor.
//!
//! Executes one attempt of a [`TaskProcessor`](crate::TaskProcessor) with an optional timeout and
//! reports what happened as a [`ProcessOutcome`].
//!
//! - **Execute ONE attempt** with a child cancellation token
//! - **Apply timeout** if non-zero: the attempt runs on a [`WorkerPool`] worker thread
//!   and is raced against the deadline
//! - **Catch panics** so they surface as ordinary processing errors
//!
//! ## Flow
//! ```text
//! timeout == 0:
//!   process(ctx, child) inline ──► Ok(Some) | Ok(None) | Err(e) | panic → Err(Processing)
//!
//! timeout > 0:
//!   deadline = now + timeout
//!   pool.acquire()  ─┬─ slot        → worker thread: process(ctx, child) until done or child cancelled
//!                    ├─ Rejected    → Err(Rejected)
//!                    ├─ deadline    → Err(Timeout)
//!                    └─ interrupted → Err(Interrupted)
//!   join worker     ─┬─ joined      → outcome (panic → Err(Processing))
//!                    ├─ deadline    → cancel child, Err(Timeout)
//!                    └─ interrupted → cancel child, Err(Interrupted)
//! ```
//!
//! ## Rules
//! - Derives a **child token** per attempt; cancelling it never affects the parent.
//! - Timeout enforcement bounds how long the caller *waits*. A worker drops the
//!   processor future at its next `.await` once the child token is cancelled; code
//!   that blocks the thread runs to completion in the background.
//! - Untimed attempts share the caller's task, so a blocking processor blocks the caller.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::{
    task::JoinError,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    core::pool::WorkerPool,
    error::TaskError,
    tasks::{ProcessOutcome, ProcessorRef, TaskContext},
};

/// Sources that may interrupt an execution: template shutdown and the caller's token.
pub(crate) struct Interrupt {
    runtime: CancellationToken,
    caller: CancellationToken,
}

impl Interrupt {
    pub(crate) fn new(runtime: CancellationToken, caller: CancellationToken) -> Self {
        Self { runtime, caller }
    }

    /// Returns the interruption reason if one is already set.
    pub(crate) fn reason(&self) -> Option<&'static str> {
        if self.runtime.is_cancelled() {
            Some(SHUTDOWN)
        } else if self.caller.is_cancelled() {
            Some(CALLER)
        } else {
            None
        }
    }

    /// Completes when either source fires.
    pub(crate) async fn wait(&self) -> &'static str {
        tokio::select! {
            _ = self.runtime.cancelled() => SHUTDOWN,
            _ = self.caller.cancelled() => CALLER,
        }
    }

    /// Token handed to the processor; cancelled on shutdown automatically.
    fn attempt_token(&self) -> CancellationToken {
        self.runtime.child_token()
    }
}

const SHUTDOWN: &str = "retry template shut down";
const CALLER: &str = "execution cancelled by caller";
const STOPPED: &str = "attempt stopped";

/// Executes a single attempt of `processor`.
///
/// A zero `timeout` runs the attempt inline in the caller's task. Otherwise the
/// attempt gets a pool worker and the caller waits at most `timeout`, including
/// any time spent waiting for a free slot.
pub(crate) async fn run_once(
    processor: &ProcessorRef,
    ctx: &TaskContext,
    timeout: Duration,
    pool: &WorkerPool,
    interrupt: &Interrupt,
) -> ProcessOutcome {
    if let Some(reason) = interrupt.reason() {
        return Err(TaskError::interrupted(reason));
    }
    let child = interrupt.attempt_token();

    if timeout.is_zero() {
        let attempt = AssertUnwindSafe(processor.process(ctx, child.clone())).catch_unwind();
        return tokio::select! {
            res = attempt => res.unwrap_or_else(|payload| Err(panic_error(payload))),
            reason = interrupt.wait() => {
                child.cancel();
                Err(TaskError::interrupted(reason))
            }
        };
    }

    let deadline = Instant::now() + timeout;
    let slot = tokio::select! {
        res = pool.acquire() => res?,
        _ = time::sleep_until(deadline) => return Err(TaskError::Timeout { timeout }),
        reason = interrupt.wait() => return Err(TaskError::interrupted(reason)),
    };

    let worker_processor = Arc::clone(processor);
    let worker_ctx = ctx.clone();
    let worker_token = child.clone();
    let mut handle = pool.spawn_attempt(slot, child.clone(), async move {
        worker_processor.process(&worker_ctx, worker_token).await
    });

    tokio::select! {
        biased;
        joined = &mut handle => match joined {
            Ok(Some(outcome)) => outcome,
            Ok(None) => Err(TaskError::interrupted(interrupt.reason().unwrap_or(STOPPED))),
            Err(err) => Err(join_error(err)),
        },
        _ = time::sleep_until(deadline) => {
            child.cancel();
            Err(TaskError::Timeout { timeout })
        }
        reason = interrupt.wait() => {
            child.cancel();
            Err(TaskError::interrupted(reason))
        }
    }
}

fn join_error(err: JoinError) -> TaskError {
    if err.is_panic() {
        panic_error(err.into_panic())
    } else {
        TaskError::interrupted("worker aborted")
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> TaskError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    TaskError::processing(format!("processor panicked: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::config::Saturation,
        error::ErrorKind,
        tasks::{ProcessorFn, TaskResult},
    };

    fn ctx() -> TaskContext {
        TaskContext::builder("t-1").build().unwrap()
    }

    fn never_interrupted() -> Interrupt {
        Interrupt::new(CancellationToken::new(), CancellationToken::new())
    }

    #[tokio::test]
    async fn inline_panic_becomes_processing_error() {
        let p = ProcessorFn::new("panics", |ctx: TaskContext, _cancel| async move {
            if ctx.retry_count() == 0 {
                panic!("kaboom");
            }
            TaskResult::success().into_outcome()
        })
        .into_ref();
        let err = run_once(&p, &ctx(), Duration::ZERO, &WorkerPool::unbounded(), &never_interrupted())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Processing);
        assert_eq!(err.to_string(), "processor panicked: kaboom");
    }

    #[tokio::test]
    async fn worker_panic_becomes_processing_error() {
        let p = ProcessorFn::new("panics", |ctx: TaskContext, _cancel| async move {
            if ctx.retry_count() == 0 {
                panic!("{}", String::from("owned"));
            }
            TaskResult::success().into_outcome()
        })
        .into_ref();
        let err = run_once(
            &p,
            &ctx(),
            Duration::from_secs(1),
            &WorkerPool::unbounded(),
            &never_interrupted(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "processor panicked: owned");
    }

    #[tokio::test]
    async fn timeout_cancels_attempt_token() {
        let seen = Arc::new(parking_lot::Mutex::new(None::<CancellationToken>));
        let slot = Arc::clone(&seen);
        let p = ProcessorFn::new("slow", move |_ctx, cancel: CancellationToken| {
            *slot.lock() = Some(cancel.clone());
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                TaskResult::success().into_outcome()
            }
        })
        .into_ref();

        let err = run_once(
            &p,
            &ctx(),
            Duration::from_millis(20),
            &WorkerPool::unbounded(),
            &never_interrupted(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "Task timed out after 20ms");
        let token = seen.lock().clone().unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn saturated_pool_rejects() {
        let pool = WorkerPool::new(1, Saturation::Reject);
        let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
        let _busy = pool
            .submit(async move {
                let _ = rx.await;
            })
            .await
            .unwrap();

        let p = ProcessorFn::new("any", |_ctx, _cancel| async move {
            TaskResult::success().into_outcome()
        })
        .into_ref();
        let err = run_once(&p, &ctx(), Duration::from_secs(1), &pool, &never_interrupted())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Rejected { limit: 1 }));
    }

    #[tokio::test]
    async fn caller_cancel_interrupts_wait() {
        let caller = CancellationToken::new();
        let interrupt = Interrupt::new(CancellationToken::new(), caller.clone());
        let p = ProcessorFn::new("slow", |_ctx, _cancel| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            TaskResult::success().into_outcome()
        })
        .into_ref();

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            caller.cancel();
        });
        let err = run_once(&p, &ctx(), Duration::from_secs(5), &WorkerPool::unbounded(), &interrupt)
            .await
            .unwrap_err();
        trigger.await.unwrap();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
        assert_eq!(err.to_string(), "Task interrupted: execution cancelled by caller");
    }

    #[tokio::test]
    async fn blocking_attempt_still_times_out() {
        let p = ProcessorFn::new("blocking", |_ctx, _cancel| async move {
            std::thread::sleep(Duration::from_millis(300));
            TaskResult::success().into_outcome()
        })
        .into_ref();

        let started = Instant::now();
        let err = run_once(
            &p,
            &ctx(),
            Duration::from_millis(30),
            &WorkerPool::unbounded(),
            &never_interrupted(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_millis(250));
    }
}
