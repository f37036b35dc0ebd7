//! # WorkerPool: bounded execution slots for timed attempts.
//!
//! The [`RetryTemplate`](crate::RetryTemplate) runs every timed attempt on a
//! dedicated worker thread so it can stop waiting when the deadline passes. The
//! pool caps how many such workers exist at once and tracks them for shutdown.
//!
//! Attempt workers come from tokio's blocking pool, so the runtime's
//! `max_blocking_threads` also bounds them when `max_workers` is unlimited.
//!
//! ## Architecture
//! ```text
//! submit(fut)
//!   ├─► shut down?           → Err(Interrupted)
//!   ├─► acquire slot
//!   │     ├─ unlimited       → no permit
//!   │     ├─ Saturation::Wait   → wait for permit (cancellable by shutdown)
//!   │     └─ Saturation::Reject → try once, Err(Rejected { limit }) when full
//!   └─► tracker.spawn(fut)   (permit dropped when the worker finishes or is aborted)
//! ```
//!
//! ## Rules
//! - `shutdown()` is idempotent: it cancels waiters, closes the semaphore and the tracker.
//! - After shutdown the pool is non-accepting; `submit` fails with `Interrupted`.
//! - Clones share the same slots and lifecycle.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    runtime::Handle,
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
    task::JoinHandle,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    core::config::{Config, Saturation},
    error::{RuntimeError, TaskError},
};

/// A reserved worker slot. Holding it keeps one unit of pool capacity busy.
pub(crate) struct Slot {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Bounded pool of attempt workers.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
    saturation: Saturation,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Creates a pool with at most `max_workers` concurrent workers (`0` = unlimited).
    pub fn new(max_workers: usize, saturation: Saturation) -> Self {
        let semaphore = (max_workers > 0).then(|| Arc::new(Semaphore::new(max_workers)));
        Self {
            semaphore,
            limit: max_workers,
            saturation,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Creates a pool sized from [`Config::max_workers`] and [`Config::saturation`].
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.worker_limit().unwrap_or(0), cfg.saturation)
    }

    /// Creates a pool without a worker limit.
    pub fn unbounded() -> Self {
        Self::new(0, Saturation::Wait)
    }

    /// Returns the worker limit (`None` = unlimited).
    pub fn limit(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|_| self.limit)
    }

    /// Returns the configured saturation behavior.
    pub fn saturation(&self) -> Saturation {
        self.saturation
    }

    /// True until [`shutdown`](Self::shutdown) is called.
    pub fn is_accepting(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Number of workers currently running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Reserves a slot and spawns `fut` on it.
    ///
    /// # Errors
    /// - [`TaskError::Interrupted`] if the pool is (or gets) shut down while waiting;
    /// - [`TaskError::Rejected`] if the pool is full and configured to reject.
    pub async fn submit<F>(&self, fut: F) -> Result<JoinHandle<F::Output>, TaskError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let slot = self.acquire().await?;
        Ok(self.spawn(slot, fut))
    }

    pub(crate) async fn acquire(&self) -> Result<Slot, TaskError> {
        if !self.is_accepting() {
            return Err(TaskError::interrupted("worker pool shut down"));
        }
        let Some(sem) = &self.semaphore else {
            return Ok(Slot { _permit: None });
        };

        match self.saturation {
            Saturation::Reject => match sem.clone().try_acquire_owned() {
                Ok(permit) => Ok(Slot {
                    _permit: Some(permit),
                }),
                Err(TryAcquireError::NoPermits) => {
                    tracing::debug!(limit = self.limit, "worker pool saturated; rejecting");
                    Err(TaskError::Rejected { limit: self.limit })
                }
                Err(TryAcquireError::Closed) => {
                    Err(TaskError::interrupted("worker pool shut down"))
                }
            },
            Saturation::Wait => {
                let permit_future = sem.clone().acquire_owned();
                tokio::pin!(permit_future);

                tokio::select! {
                    res = &mut permit_future => match res {
                        Ok(permit) => Ok(Slot { _permit: Some(permit) }),
                        Err(_closed) => Err(TaskError::interrupted("worker pool shut down")),
                    },
                    _ = self.token.cancelled() => {
                        Err(TaskError::interrupted("worker pool shut down"))
                    }
                }
            }
        }
    }

    pub(crate) fn spawn<F>(&self, slot: Slot, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(async move {
            let _slot = slot;
            fut.await
        })
    }

    /// Runs `fut` on a blocking-pool thread of the current runtime until it
    /// completes (`Some`) or `stop` is cancelled (`None`, the future is dropped).
    ///
    /// The attempt never shares a thread with the caller, so a processor that
    /// blocks cannot hold back the caller's deadline, even on a `current_thread`
    /// runtime.
    pub(crate) fn spawn_attempt<F>(
        &self,
        slot: Slot,
        stop: CancellationToken,
        fut: F,
    ) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let runtime = Handle::current();
        self.tracker.spawn_blocking(move || {
            let _slot = slot;
            runtime.block_on(async move {
                tokio::select! {
                    biased;
                    out = fut => Some(out),
                    _ = stop.cancelled() => None,
                }
            })
        })
    }

    /// Stops accepting work and wakes every waiter. Idempotent.
    ///
    /// Running workers are not aborted; they finish (or observe their own
    /// cancellation token) and release their slots.
    pub fn shutdown(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        if let Some(sem) = &self.semaphore {
            sem.close();
        }
        self.tracker.close();
        tracing::info!(active = self.active(), "worker pool shut down");
    }

    /// Shuts down and waits up to `grace` for running workers to finish.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] if workers are still running after `grace`.
    pub async fn shutdown_graceful(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.shutdown();
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(RuntimeError::GraceExceeded {
                grace,
                in_flight: self.active(),
            }),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
