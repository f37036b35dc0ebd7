//! # In-memory metrics collector.
//!
//! [`InMemoryMetrics`] keeps per-processor counters in process memory. It is
//! useful for tests, health endpoints, and as a reference for exporters: take a
//! [`snapshot`](InMemoryMetrics::snapshot) and serialize it however the host wants.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use retrykit::{InMemoryMetrics, MetricsCollector, TaskResult};
//!
//! let metrics = InMemoryMetrics::new();
//! metrics.record_execution("sync");
//! metrics.record_result("sync", &TaskResult::success().build());
//! metrics.record_latency("sync", Duration::from_millis(12));
//!
//! let stats = metrics.processor("sync").unwrap();
//! assert_eq!(stats.executions, 1);
//! assert_eq!(stats.successes, 1);
//! ```

use std::{collections::HashMap, time::Duration};

use parking_lot::RwLock;
use serde::Serialize;

use crate::{
    metrics::collector::MetricsCollector,
    tasks::{TaskResult, TaskStatus},
};

/// Counters for one processor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorMetrics {
    /// Attempts executed.
    pub executions: u64,
    /// Attempts that ended in `Success`.
    pub successes: u64,
    /// Attempts that ended in `Failed`.
    pub failures: u64,
    /// Attempts that ended in `Cancelled`.
    pub cancellations: u64,
    /// Sum of attempt latencies.
    pub total_latency: Duration,
    /// Slowest attempt.
    pub max_latency: Duration,
    /// Highest retry count seen.
    pub max_retries: u32,
}

impl ProcessorMetrics {
    /// Mean attempt latency, zero when nothing was recorded.
    pub fn mean_latency(&self) -> Duration {
        if self.executions == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.executions);
        Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
    }
}

/// Thread-safe per-processor counters.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    by_processor: RwLock<HashMap<String, ProcessorMetrics>>,
}

impl InMemoryMetrics {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for one processor, if it ever ran.
    pub fn processor(&self, name: &str) -> Option<ProcessorMetrics> {
        self.by_processor.read().get(name).cloned()
    }

    /// Copy of all counters, keyed by processor name.
    pub fn snapshot(&self) -> HashMap<String, ProcessorMetrics> {
        self.by_processor.read().clone()
    }

    /// Drops all counters.
    pub fn reset(&self) {
        self.by_processor.write().clear();
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut ProcessorMetrics)) {
        let mut map = self.by_processor.write();
        match map.get_mut(name) {
            Some(m) => f(m),
            None => {
                let mut m = ProcessorMetrics::default();
                f(&mut m);
                map.insert(name.to_string(), m);
            }
        }
    }
}

impl MetricsCollector for InMemoryMetrics {
    fn record_execution(&self, processor: &str) {
        self.update(processor, |m| m.executions += 1);
    }

    fn record_result(&self, processor: &str, result: &TaskResult) {
        self.update(processor, |m| match result.status() {
            TaskStatus::Success => m.successes += 1,
            TaskStatus::Failed => m.failures += 1,
            TaskStatus::Cancelled => m.cancellations += 1,
        });
    }

    fn record_latency(&self, processor: &str, latency: Duration) {
        self.update(processor, |m| {
            m.total_latency = m.total_latency.saturating_add(latency);
            m.max_latency = m.max_latency.max(latency);
        });
    }

    fn record_retries(&self, processor: &str, retries: u32) {
        self.update(processor, |m| m.max_retries = m.max_retries.max(retries));
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
