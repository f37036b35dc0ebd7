//! # Per-attempt execution context.
//!
//! [`TaskContext`] is an immutable value describing one logical task submission:
//! its id, optional idempotency key, labels, parameters, the current retry count,
//! the attempt timeout and any trace metadata.
//!
//! The template derives a fresh copy before every attempt via
//! [`TaskContext::with_retry_count`]; collections are shared behind `Arc`, so
//! derived copies are cheap and the original is never mutated.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use retrykit::TaskContext;
//!
//! let ctx = TaskContext::builder("sync-orders")
//!     .idempotent_key("orders-2024-06-01")
//!     .label("env", "prod")
//!     .parameter("batch", 500)
//!     .timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let next = ctx.increment_retry_count();
//! assert_eq!(ctx.retry_count(), 0);
//! assert_eq!(next.retry_count(), 1);
//! assert_eq!(next.parameter_as::<u32>("batch"), Some(500));
//! # Ok::<(), retrykit::RuntimeError>(())
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RuntimeError;

/// Default attempt timeout applied when the builder is not told otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable execution context for one attempt.
#[derive(Clone, Debug)]
pub struct TaskContext {
    task_id: Arc<str>,
    idempotent_key: Option<Arc<str>>,
    labels: Arc<BTreeMap<String, String>>,
    parameters: Arc<HashMap<String, Value>>,
    retry_count: u32,
    timeout: Option<Duration>,
    trace_context: Arc<HashMap<String, String>>,
}

impl TaskContext {
    /// Starts building a context for `task_id`.
    pub fn builder(task_id: impl Into<String>) -> TaskContextBuilder {
        TaskContextBuilder::new(task_id.into())
    }

    /// Task identifier (never empty).
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Idempotency key, if any.
    pub fn idempotent_key(&self) -> Option<&str> {
        self.idempotent_key.as_deref()
    }

    pub(crate) fn idempotent_key_arc(&self) -> Option<Arc<str>> {
        self.idempotent_key.clone()
    }

    /// All labels, ordered by key.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Single label lookup.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// All parameters.
    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    /// Raw parameter lookup.
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// Typed parameter lookup.
    ///
    /// Returns `None` when the key is missing or the value does not deserialize into `T`.
    pub fn parameter_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.parameters
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Number of retries already performed before this attempt.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Attempt timeout.
    ///
    /// - `None` → defer to [`TaskProcessor::timeout`](crate::TaskProcessor::timeout)
    /// - `Some(Duration::ZERO)` → no timeout, run inline
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Trace propagation metadata (trace id, span id, ...).
    pub fn trace_context(&self) -> &HashMap<String, String> {
        &self.trace_context
    }

    /// Returns a copy with a different retry count.
    #[must_use]
    pub fn with_retry_count(&self, retry_count: u32) -> Self {
        Self {
            retry_count,
            ..self.clone()
        }
    }

    /// Returns a copy with the retry count incremented by one (saturating).
    #[must_use]
    pub fn increment_retry_count(&self) -> Self {
        self.with_retry_count(self.retry_count.saturating_add(1))
    }

    /// Returns a copy with a different timeout.
    #[must_use]
    pub fn with_timeout(&self, timeout: impl Into<Option<Duration>>) -> Self {
        Self {
            timeout: timeout.into(),
            ..self.clone()
        }
    }

    /// Returns a builder pre-filled with this context's values.
    pub fn to_builder(&self) -> TaskContextBuilder {
        TaskContextBuilder {
            task_id: self.task_id.to_string(),
            idempotent_key: self.idempotent_key.as_deref().map(str::to_string),
            labels: (*self.labels).clone(),
            parameters: (*self.parameters).clone(),
            retry_count: self.retry_count,
            timeout: self.timeout,
            trace_context: (*self.trace_context).clone(),
        }
    }
}

/// Builder for [`TaskContext`].
///
/// Collections passed in are copied, so later changes on the caller's side
/// never leak into a built context.
#[derive(Clone, Debug)]
pub struct TaskContextBuilder {
    task_id: String,
    idempotent_key: Option<String>,
    labels: BTreeMap<String, String>,
    parameters: HashMap<String, Value>,
    retry_count: u32,
    timeout: Option<Duration>,
    trace_context: HashMap<String, String>,
}

impl TaskContextBuilder {
    fn new(task_id: String) -> Self {
        Self {
            task_id,
            idempotent_key: None,
            labels: BTreeMap::new(),
            parameters: HashMap::new(),
            retry_count: 0,
            timeout: Some(DEFAULT_TIMEOUT),
            trace_context: HashMap::new(),
        }
    }

    /// Sets the idempotency key.
    pub fn idempotent_key(mut self, key: impl Into<String>) -> Self {
        self.idempotent_key = Some(key.into());
        self
    }

    /// Replaces all labels.
    pub fn labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels = labels
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Adds one label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Replaces all parameters.
    pub fn parameters<I, K>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.parameters = parameters
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        self
    }

    /// Adds one parameter.
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Sets the starting retry count.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Sets the attempt timeout (`None` defers to the processor).
    pub fn timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Replaces the trace context.
    pub fn trace_context<I, K, V>(mut self, trace: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.trace_context = trace
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Builds the context.
    ///
    /// Fails with [`RuntimeError::InvalidTaskId`] if the task id is empty or blank.
    pub fn build(self) -> Result<TaskContext, RuntimeError> {
        if self.task_id.trim().is_empty() {
            return Err(RuntimeError::InvalidTaskId);
        }
        Ok(TaskContext {
            task_id: Arc::from(self.task_id),
            idempotent_key: self.idempotent_key.map(Arc::from),
            labels: Arc::new(self.labels),
            parameters: Arc::new(self.parameters),
            retry_count: self.retry_count,
            timeout: self.timeout,
            trace_context: Arc::new(self.trace_context),
        })
    }
}
