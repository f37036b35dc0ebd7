//! # Example: timeout_cancel
//!
//! Shows the three ways an execution ends early:
//! 1. an attempt exceeds its timeout (the processor's token is cancelled);
//! 2. the caller cancels the execution during a backoff sleep;
//! 3. the template is shut down while work is in flight.
//!
//! ## Run
//! ```bash
//! cargo run --example timeout_cancel
//! ```

use std::{sync::Arc, time::Duration};

use retrykit::{
    policies, Config, ProcessorFn, ProcessorRef, RetryTemplate, TaskContext, TaskError,
    TaskResult,
};
use tokio_util::sync::CancellationToken;

/// Sleeps for `work`, stopping early if its token is cancelled.
fn slow(name: &'static str, work: Duration) -> ProcessorRef {
    ProcessorFn::new(name, move |ctx: TaskContext, cancel: CancellationToken| async move {
        println!("[{name}] attempt retry_count={}", ctx.retry_count());
        tokio::select! {
            _ = tokio::time::sleep(work) => TaskResult::success().into_outcome(),
            _ = cancel.cancelled() => {
                println!("[{name}] token cancelled, cleaning up");
                Err(TaskError::processing("stopped"))
            }
        }
    })
    .with_policy(policies::fixed_delay(2, Duration::from_millis(500)))
    .into_ref()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let template = Arc::new(RetryTemplate::new(Config::default()));

    // 1. Timeout: 100ms budget for 1s of work. Built-in policies never retry a timeout.
    let ctx = TaskContext::builder("report-1")
        .timeout(Duration::from_millis(100))
        .build()?;
    let result = template.execute(&slow("report", Duration::from_secs(1)), &ctx).await?;
    println!("[main] timeout  → {} ({:?})", result.status().as_label(), result.error_message());

    // 2. Caller cancellation: fail fast, then cancel during the 500ms backoff.
    let failing = ProcessorFn::new("failing", |_ctx: TaskContext, _cancel: CancellationToken| async move {
        Err(TaskError::processing("connection refused"))
    })
    .with_policy(policies::fixed_delay(5, Duration::from_millis(500)))
    .into_ref();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });
    let result = template
        .execute_with_cancel(&failing, &TaskContext::builder("sync-1").build()?, cancel)
        .await?;
    println!("[main] cancel   → {} ({:?})", result.status().as_label(), result.error_message());

    // 3. Shutdown while an attempt is running.
    let running = {
        let template = Arc::clone(&template);
        tokio::spawn(async move {
            let ctx = TaskContext::builder("export-1").build()?;
            template.execute(&slow("export", Duration::from_secs(10)), &ctx).await.map_err(anyhow::Error::from)
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    template.shutdown_graceful().await?;
    let result = running.await??;
    println!("[main] shutdown → {} ({:?})", result.status().as_label(), result.error_message());

    match template.execute(&failing, &TaskContext::builder("late").build()?).await {
        Err(e) => println!("[main] after shutdown → {e}"),
        Ok(_) => println!("[main] unexpected success after shutdown"),
    }
    Ok(())
}
