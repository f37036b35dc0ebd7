//! # Example: flaky_retry
//!
//! A processor that fails twice before succeeding, retried with exponential
//! backoff and equal jitter. Every attempt is logged by [`LogWriter`] and counted
//! by [`InMemoryMetrics`].
//!
//! ## Flow
//! ```text
//! RetryTemplate::execute()
//!   ├─► attempt retry=0 → Err("upstream reset #1") → Failed
//!   ├─► can_retry(0) → sleep(next_delay(1) ≈ 100ms)
//!   ├─► attempt retry=1 → Err("upstream reset #2") → Failed
//!   ├─► can_retry(1) → sleep(next_delay(2) ≈ 200ms)
//!   └─► attempt retry=2 → Success → return
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example flaky_retry
//! ```

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use retrykit::{
    Config, ExponentialBackoff, InMemoryMetrics, JitterPolicy, LogWriter, ProcessorFn,
    RetryTemplate, TaskContext, TaskError, TaskResult,
};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // 1. Template with a log collector and an in-memory counter.
    let metrics = Arc::new(InMemoryMetrics::new());
    let template = RetryTemplate::builder(Config::default())
        .with_collector(Arc::new(LogWriter::new()))
        .with_collector(metrics.clone())
        .build();

    // 2. Backoff: 100ms doubling up to 2s, equal jitter, only for processing errors.
    let backoff = ExponentialBackoff::new(4, Duration::from_millis(100), Duration::from_secs(2))
        .with_jitter(JitterPolicy::Equal)
        .retry_if(|e: &TaskError| matches!(e, TaskError::Processing { .. }));

    // 3. A processor that fails twice.
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let flaky = ProcessorFn::new("flaky", move |ctx: TaskContext, _cancel: CancellationToken| {
        let counter = Arc::clone(&counter);
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[flaky] attempt {n} (retry_count={})", ctx.retry_count());
            if n <= 2 {
                return Err(TaskError::processing(format!("upstream reset #{n}")));
            }
            TaskResult::success().into_outcome()
        }
    })
    .with_policy(Arc::new(backoff))
    .into_ref();

    // 4. Run it once; the template drives the retries.
    let ctx = TaskContext::builder("invoice-2024-001")
        .idempotent_key("invoice-2024-001")
        .label("tenant", "acme")
        .build()?;
    let result = template.execute(&flaky, &ctx).await?;

    println!(
        "[main] status={} duration={:?} idempotent_hit={}",
        result.status().as_label(),
        result.duration().unwrap_or_default(),
        result.idempotent_hit()
    );
    if let Some(m) = metrics.processor("flaky") {
        println!("[main] metrics: {}", serde_json::to_string(&m)?);
    }

    template.shutdown_graceful().await?;
    Ok(())
}
