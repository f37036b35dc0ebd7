//! # LogWriter: attempt logger
//!
//! A minimal collector that writes every attempt through `tracing`.
//! Attach it when a host wants per-attempt visibility without a metrics backend.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO retrykit::metrics::log: attempt finished processor="sync" status="success" latency_ms=12 retries=0
//! WARN retrykit::metrics::log: attempt finished processor="sync" status="failed" error="connection refused" retries=1
//! WARN retrykit::metrics::log: attempt finished processor="sync" status="cancelled" error="Task timed out after 5s" retries=0
//! ```

use std::time::Duration;

use crate::{
    metrics::collector::MetricsCollector,
    tasks::{TaskResult, TaskStatus},
};

/// Tracing-backed collector.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MetricsCollector for LogWriter {
    fn record_execution(&self, _processor: &str) {}

    fn record_result(&self, processor: &str, result: &TaskResult) {
        let latency_ms = result.duration().map(|d| d.as_millis() as u64);
        match result.status() {
            TaskStatus::Success => tracing::info!(
                processor = %processor,
                status = result.status().as_label(),
                latency_ms,
                idempotent_key = result.idempotent_key(),
                "attempt finished"
            ),
            TaskStatus::Failed | TaskStatus::Cancelled => tracing::warn!(
                processor = %processor,
                status = result.status().as_label(),
                latency_ms,
                error = result.error_message(),
                idempotent_key = result.idempotent_key(),
                "attempt finished"
            ),
        }
    }

    fn record_latency(&self, _processor: &str, _latency: Duration) {}

    fn record_retries(&self, processor: &str, retries: u32) {
        if retries > 0 {
            tracing::debug!(processor = %processor, retries, "attempt was a retry");
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
