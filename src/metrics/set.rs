//! # CollectorSet: synchronous fan-out over multiple collectors
//!
//! [`CollectorSet`] forwards every attempt to each configured
//! [`MetricsCollector`], in registration order.
//!
//! ## What it guarantees
//! - Per-collector call order matches the attempt order.
//! - Panics inside a collector are caught and logged (isolation); other
//!   collectors still receive the attempt.
//!
//! ## Diagram
//! ```text
//!    record(name, &TaskResult, retries)
//!        ├────► C1.record_execution → record_result → record_latency → record_retries
//!        ├────► C2 ...
//!        └────► CN ...
//! ```

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use crate::{metrics::collector::MetricsCollector, tasks::TaskResult};

/// Composite fan-out over collectors.
#[derive(Clone, Default)]
pub struct CollectorSet {
    collectors: Vec<Arc<dyn MetricsCollector>>,
}

impl CollectorSet {
    /// Creates a set over the given collectors.
    #[must_use]
    pub fn new(collectors: Vec<Arc<dyn MetricsCollector>>) -> Self {
        Self { collectors }
    }

    /// Reports one attempt to every collector.
    pub fn record(&self, processor: &str, result: &TaskResult, retries: u32) {
        for c in &self.collectors {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                c.record_execution(processor);
                c.record_result(processor, result);
                if let Some(latency) = result.duration() {
                    c.record_latency(processor, latency);
                }
                c.record_retries(processor, retries);
            }));
            if outcome.is_err() {
                tracing::warn!(
                    collector = c.name(),
                    processor = %processor,
                    "metrics collector panicked; attempt not recorded"
                );
            }
        }
    }

    /// Number of collectors.
    pub(crate) fn len(&self) -> usize {
        self.collectors.len()
    }
}
