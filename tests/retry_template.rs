use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use retrykit::{
    policies, Config, ErrorKind, InMemoryMetrics, MetricsCollector, PolicyRef, ProcessOutcome,
    ProcessorFn, ProcessorRef, RetryPolicy, RetryTemplate, RuntimeError, Saturation, TaskContext,
    TaskError, TaskProcessor, TaskResult, TaskStatus, WorkerPool,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ctx(task_id: &str) -> TaskContext {
    TaskContext::builder(task_id).build().unwrap()
}

/// Processor that fails its first `failures` calls, then succeeds.
fn flaky(name: &'static str, failures: u32, calls: Arc<AtomicU32>, policy: PolicyRef) -> ProcessorRef {
    ProcessorFn::new(name, move |_ctx, _cancel| {
        let calls = Arc::clone(&calls);
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                return Err(TaskError::processing("Unexpected error"));
            }
            TaskResult::success().into_outcome()
        }
    })
    .with_policy(policy)
    .into_ref()
}

fn sleeper(name: &'static str, sleep: Duration, calls: Arc<AtomicU32>, policy: PolicyRef) -> ProcessorRef {
    ProcessorFn::new(name, move |_ctx, _cancel| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(sleep).await;
            TaskResult::success().into_outcome()
        }
    })
    .with_policy(policy)
    .into_ref()
}

#[tokio::test]
async fn no_retry_runs_once() {
    init_tracing();
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let p = flaky("always-fails", u32::MAX, calls.clone(), policies::no_retry());

    let result = template.execute(&p, &ctx("t-1")).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.status(), TaskStatus::Failed);
    assert_eq!(result.error_message(), Some("Unexpected error"));
    assert_eq!(result.error().map(TaskError::kind), Some(ErrorKind::Processing));
}

#[tokio::test]
async fn fixed_delay_exhausts_retries() {
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let p = flaky(
        "always-fails",
        u32::MAX,
        calls.clone(),
        policies::fixed_delay(3, Duration::from_millis(1)),
    );

    let result = template.execute(&p, &ctx("t-2")).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(result.is_failure());
}

#[tokio::test]
async fn recovers_after_two_failures() {
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let p = flaky(
        "flaky",
        2,
        calls.clone(),
        policies::fixed_delay(3, Duration::from_millis(10)),
    );

    let started = Instant::now();
    let result = template.execute(&p, &ctx("t-3")).await.unwrap();

    assert!(result.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[tokio::test]
async fn context_timeout_cancels_slow_attempt() {
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let p = sleeper(
        "slow",
        Duration::from_millis(500),
        calls.clone(),
        policies::fixed_delay(3, Duration::from_millis(1)),
    );
    let ctx = TaskContext::builder("t-4")
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let started = Instant::now();
    let result = template.execute(&p, &ctx).await.unwrap();

    assert_eq!(result.status(), TaskStatus::Cancelled);
    assert!(result.error_message().unwrap().contains("50ms"));
    assert_eq!(result.error().map(TaskError::kind), Some(ErrorKind::Timeout));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn blocking_processor_times_out_on_current_thread() {
    let template = RetryTemplate::new(Config::default());
    let p = ProcessorFn::new("blocking", |_ctx, _cancel| async move {
        std::thread::sleep(Duration::from_millis(500));
        TaskResult::success().into_outcome()
    })
    .with_policy(policies::no_retry())
    .into_ref();
    let ctx = TaskContext::builder("t-4b")
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let started = Instant::now();
    let result = template.execute(&p, &ctx).await.unwrap();

    assert_eq!(result.status(), TaskStatus::Cancelled);
    assert!(result.error_message().unwrap().contains("50ms"));
    assert!(started.elapsed() < Duration::from_millis(400));
}

/// Retries everything, timeouts included.
struct RetryTimeouts;

impl RetryPolicy for RetryTimeouts {
    fn can_retry(&self, retry_count: u32, _last: &TaskResult, _error: Option<&TaskError>) -> bool {
        retry_count < 2
    }

    fn next_delay(&self, _retry_count: u32) -> Duration {
        Duration::from_millis(1)
    }
}

#[tokio::test]
async fn custom_policy_may_retry_timeouts() {
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let p = sleeper(
        "slow",
        Duration::from_millis(200),
        calls.clone(),
        Arc::new(RetryTimeouts),
    );
    let ctx = TaskContext::builder("t-5")
        .timeout(Duration::from_millis(20))
        .build()
        .unwrap();

    let result = template.execute(&p, &ctx).await.unwrap();

    assert!(result.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn idempotency_key_reaches_every_result() {
    let metrics_seen = Arc::new(parking_lot::Mutex::new(Vec::<TaskResult>::new()));

    struct Capture(Arc<parking_lot::Mutex<Vec<TaskResult>>>);
    impl MetricsCollector for Capture {
        fn record_execution(&self, _: &str) {}
        fn record_result(&self, _: &str, result: &TaskResult) {
            self.0.lock().push(result.clone());
        }
        fn record_latency(&self, _: &str, _: Duration) {}
        fn record_retries(&self, _: &str, _: u32) {}
    }

    let template = RetryTemplate::builder(Config::default())
        .with_collector(Arc::new(Capture(metrics_seen.clone())))
        .build();
    let calls = Arc::new(AtomicU32::new(0));
    let p = flaky("keyed", 1, calls, policies::fixed_delay(2, Duration::from_millis(1)));

    let keyed = TaskContext::builder("t-6")
        .idempotent_key("order-42")
        .build()
        .unwrap();
    let result = template.execute(&p, &keyed).await.unwrap();
    assert!(result.is_success());

    let seen = metrics_seen.lock().clone();
    assert_eq!(seen.len(), 2);
    for r in &seen {
        assert_eq!(r.idempotent_key(), Some("order-42"));
        assert!(r.idempotent_hit());
    }

    let unkeyed = template.execute(&p, &ctx("t-7")).await.unwrap();
    assert_eq!(unkeyed.idempotent_key(), None);
    assert!(!unkeyed.idempotent_hit());
}

#[tokio::test]
async fn results_carry_timing() {
    let template = RetryTemplate::new(Config::default());
    let p = sleeper(
        "timed",
        Duration::from_millis(15),
        Arc::new(AtomicU32::new(0)),
        policies::no_retry(),
    );

    let result = template.execute(&p, &ctx("t-8")).await.unwrap();

    assert!(result.start_time().is_some());
    assert!(result.duration().unwrap() >= Duration::from_millis(15));
}

#[tokio::test]
async fn null_result_is_retried_then_reported() {
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let p = ProcessorFn::new("empty", move |_ctx, _cancel| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(None) }
    })
    .with_policy(policies::fixed_delay(1, Duration::from_millis(1)))
    .into_ref();

    let result = template.execute(&p, &ctx("t-9")).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(result.is_failure());
    assert_eq!(result.error_message(), Some("Task returned null result"));
}

#[tokio::test]
async fn retry_count_advances_per_attempt() {
    let template = RetryTemplate::new(Config::default());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let p = ProcessorFn::new("counting", move |ctx: TaskContext, _cancel| {
        sink.lock().push(ctx.retry_count());
        async move { Err(TaskError::processing("again")) }
    })
    .with_policy(policies::fixed_delay(2, Duration::ZERO))
    .into_ref();

    let start = TaskContext::builder("t-10").retry_count(1).build().unwrap();
    let result = template.execute(&p, &start).await.unwrap();

    assert!(result.is_failure());
    assert_eq!(*seen.lock(), vec![1, 2]);
}

#[tokio::test]
async fn processor_cancelled_result_is_terminal() {
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let p = ProcessorFn::new("gives-up", move |_ctx, _cancel| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { TaskResult::cancelled().error_message("not today").into_outcome() }
    })
    .with_policy(Arc::new(RetryTimeouts))
    .into_ref();

    let result = template.execute(&p, &ctx("t-11")).await.unwrap();

    assert!(result.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn metrics_cover_every_attempt() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let template = RetryTemplate::builder(Config::default())
        .with_collector(metrics.clone())
        .build();
    let p = flaky(
        "metered",
        2,
        Arc::new(AtomicU32::new(0)),
        policies::fixed_delay(3, Duration::from_millis(1)),
    );

    template.execute(&p, &ctx("t-12")).await.unwrap();

    let stats = metrics.processor("metered").unwrap();
    assert_eq!(stats.executions, 3);
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.max_retries, 2);
}

#[tokio::test]
async fn shutdown_rejects_new_executions() {
    let template = RetryTemplate::new(Config::default());
    assert!(!template.is_shutdown());

    template.shutdown();
    template.shutdown();

    assert!(template.is_shutdown());
    assert!(!template.pool().is_accepting());
    let p = flaky("any", 0, Arc::new(AtomicU32::new(0)), policies::no_retry());
    let err = template.execute(&p, &ctx("t-13")).await.unwrap_err();
    assert_eq!(err, RuntimeError::Shutdown);
}

#[tokio::test]
async fn shutdown_interrupts_backoff() {
    let template = Arc::new(RetryTemplate::new(Config::default()));
    let calls = Arc::new(AtomicU32::new(0));
    let p = flaky(
        "patient",
        u32::MAX,
        calls.clone(),
        policies::fixed_delay(5, Duration::from_secs(30)),
    );

    let run = {
        let template = Arc::clone(&template);
        tokio::spawn(async move { template.execute(&p, &ctx("t-14")).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    template.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("execution should stop promptly")
        .unwrap()
        .unwrap();
    assert!(result.is_cancelled());
    assert_eq!(result.error().map(TaskError::kind), Some(ErrorKind::Interrupted));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn caller_token_interrupts_attempt() {
    let template = RetryTemplate::new(Config::default());
    let calls = Arc::new(AtomicU32::new(0));
    let p = sleeper(
        "long",
        Duration::from_secs(10),
        calls,
        policies::fixed_delay(3, Duration::from_millis(1)),
    );
    let ctx = TaskContext::builder("t-15")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = template.execute_with_cancel(&p, &ctx, cancel).await.unwrap();
    assert!(result.is_cancelled());
    assert_eq!(
        result.error_message(),
        Some("Task interrupted: execution cancelled by caller")
    );
    assert!(!template.is_shutdown());
}

#[tokio::test]
async fn saturated_pool_with_reject_fails_attempt() {
    let pool = WorkerPool::new(1, Saturation::Reject);
    let template = RetryTemplate::builder(Config::default())
        .with_pool(pool.clone())
        .build();

    let (_hold, rx) = tokio::sync::oneshot::channel::<()>();
    let _busy = pool
        .submit(async move {
            let _ = rx.await;
        })
        .await
        .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let p = flaky("crowded", 0, calls.clone(), policies::no_retry());
    let ctx = TaskContext::builder("t-16")
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let result = template.execute(&p, &ctx).await.unwrap();
    assert!(result.is_failure());
    assert_eq!(result.error().map(TaskError::kind), Some(ErrorKind::Rejected));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn untimed_attempt_runs_inline_and_catches_panics() {
    let template = RetryTemplate::new(Config::default());
    let p = ProcessorFn::new("panicky", |ctx: TaskContext, _cancel| async move {
        if ctx.retry_count() == 0 {
            panic!("bad input");
        }
        TaskResult::success().into_outcome()
    })
    .with_policy(policies::fixed_delay(1, Duration::ZERO))
    .into_ref();
    let ctx = TaskContext::builder("t-17")
        .timeout(Duration::ZERO)
        .build()
        .unwrap();

    let result = template.execute(&p, &ctx).await.unwrap();

    assert!(result.is_success());
    assert_eq!(template.pool().active(), 0);
}

#[tokio::test]
async fn template_is_shareable_across_tasks() {
    let template = Arc::new(RetryTemplate::new(Config {
        max_workers: 2,
        ..Config::default()
    }));
    let calls = Arc::new(AtomicU32::new(0));
    let p = sleeper(
        "shared",
        Duration::from_millis(10),
        calls.clone(),
        policies::no_retry(),
    );

    let mut handles = Vec::new();
    for i in 0..6 {
        let template = Arc::clone(&template);
        let p = Arc::clone(&p);
        handles.push(tokio::spawn(async move {
            template.execute(&p, &ctx(&format!("job-{i}"))).await
        }));
    }
    for h in handles {
        assert!(h.await.unwrap().unwrap().is_success());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn graceful_shutdown_waits_for_workers() {
    let template = RetryTemplate::new(Config {
        shutdown_grace: Duration::from_millis(500),
        ..Config::default()
    });
    assert!(template.shutdown_graceful().await.is_ok());
    assert!(template.is_shutdown());
}

/// Fails its first attempt and reports a key of its own choosing.
struct OwnKey {
    calls: AtomicU32,
}

#[async_trait]
impl TaskProcessor for OwnKey {
    fn name(&self) -> &str {
        "own-key"
    }

    async fn process(&self, _ctx: &TaskContext, _cancel: CancellationToken) -> ProcessOutcome {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(TaskError::processing("first try fails"));
        }
        TaskResult::success().into_outcome()
    }

    fn retry_policy(&self) -> PolicyRef {
        policies::fixed_delay(2, Duration::from_millis(1))
    }

    fn idempotent_key(&self, _ctx: &TaskContext) -> Option<Arc<str>> {
        Some("derived".into())
    }
}

#[tokio::test]
async fn every_attempt_carries_the_context_key() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::<Option<String>>::new()));

    struct Keys(Arc<parking_lot::Mutex<Vec<Option<String>>>>);
    impl MetricsCollector for Keys {
        fn record_execution(&self, _: &str) {}
        fn record_result(&self, _: &str, result: &TaskResult) {
            self.0.lock().push(result.idempotent_key().map(str::to_string));
        }
        fn record_latency(&self, _: &str, _: Duration) {}
        fn record_retries(&self, _: &str, _: u32) {}
    }

    let template = RetryTemplate::builder(Config::default())
        .with_collector(Arc::new(Keys(seen.clone())))
        .build();
    let p: ProcessorRef = Arc::new(OwnKey {
        calls: AtomicU32::new(0),
    });

    let keyed = TaskContext::builder("t-20")
        .idempotent_key("ctx-key")
        .build()
        .unwrap();
    let result = template.execute(&p, &keyed).await.unwrap();
    assert!(result.is_success());
    assert_eq!(
        *seen.lock(),
        vec![Some("ctx-key".to_string()), Some("ctx-key".to_string())]
    );

    seen.lock().clear();
    let unkeyed = template.execute(&p, &ctx("t-21")).await.unwrap();
    assert!(unkeyed.is_success());
    assert_eq!(unkeyed.idempotent_key(), None);
    assert!(!unkeyed.idempotent_hit());
}
