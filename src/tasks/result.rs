//! # Outcome of one attempt.
//!
//! [`TaskResult`] is immutable once built. Processors build one per attempt with
//! [`TaskResult::builder`] (or the `success`/`failed`/`cancelled` shortcuts); the
//! template then normalizes it (timing, idempotency fields) before handing it to
//! the retry policy and metrics collectors.

use std::{collections::HashMap, sync::Arc, time::Duration, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TaskError;

/// Terminal status of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The attempt completed successfully.
    Success,
    /// The attempt failed; may be retried depending on the policy.
    Failed,
    /// The attempt was cancelled (timeout, interruption, or by the processor itself).
    Cancelled,
}

impl TaskStatus {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Immutable result of one attempt.
#[derive(Clone, Debug)]
pub struct TaskResult {
    status: TaskStatus,
    start_time: Option<SystemTime>,
    duration: Option<Duration>,
    error_message: Option<String>,
    error: Option<TaskError>,
    output: Option<Arc<HashMap<String, Value>>>,
    idempotent_key: Option<Arc<str>>,
    idempotent_hit: bool,
}

impl TaskResult {
    /// Starts building a result with the given status.
    pub fn builder(status: TaskStatus) -> TaskResultBuilder {
        TaskResultBuilder::new(status)
    }

    /// Shortcut for `builder(TaskStatus::Success)`.
    pub fn success() -> TaskResultBuilder {
        Self::builder(TaskStatus::Success)
    }

    /// Shortcut for `builder(TaskStatus::Failed)`.
    pub fn failed() -> TaskResultBuilder {
        Self::builder(TaskStatus::Failed)
    }

    /// Shortcut for `builder(TaskStatus::Cancelled)`.
    pub fn cancelled() -> TaskResultBuilder {
        Self::builder(TaskStatus::Cancelled)
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == TaskStatus::Cancelled
    }

    /// Wall-clock start of the attempt.
    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    /// How long the attempt took.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn output(&self) -> Option<&HashMap<String, Value>> {
        self.output.as_deref()
    }

    pub fn idempotent_key(&self) -> Option<&str> {
        self.idempotent_key.as_deref()
    }

    /// True iff an idempotency key was associated with this attempt.
    pub fn idempotent_hit(&self) -> bool {
        self.idempotent_hit
    }

    /// Returns a builder pre-filled with this result's values.
    pub(crate) fn to_builder(&self) -> TaskResultBuilder {
        TaskResultBuilder {
            status: self.status,
            start_time: self.start_time,
            duration: self.duration,
            error_message: self.error_message.clone(),
            error: self.error.clone(),
            output: self.output.clone(),
            idempotent_key: self.idempotent_key.clone(),
            idempotent_hit: Some(self.idempotent_hit),
        }
    }
}

/// Builder for [`TaskResult`].
#[derive(Clone, Debug)]
pub struct TaskResultBuilder {
    status: TaskStatus,
    start_time: Option<SystemTime>,
    duration: Option<Duration>,
    error_message: Option<String>,
    error: Option<TaskError>,
    output: Option<Arc<HashMap<String, Value>>>,
    idempotent_key: Option<Arc<str>>,
    idempotent_hit: Option<bool>,
}

impl TaskResultBuilder {
    fn new(status: TaskStatus) -> Self {
        Self {
            status,
            start_time: None,
            duration: None,
            error_message: None,
            error: None,
            output: None,
            idempotent_key: None,
            idempotent_hit: None,
        }
    }

    pub fn start_time(mut self, at: SystemTime) -> Self {
        self.start_time = Some(at);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Attaches an error. Does not touch `error_message`.
    pub fn error(mut self, error: TaskError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn output(mut self, output: HashMap<String, Value>) -> Self {
        self.output = Some(Arc::new(output));
        self
    }

    pub fn idempotent_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.idempotent_key = Some(key.into());
        self
    }

    pub(crate) fn idempotent_key_opt(mut self, key: Option<Arc<str>>) -> Self {
        self.idempotent_key = key;
        self
    }

    /// Overrides the idempotency hit flag.
    ///
    /// When never called, the flag defaults to whether an idempotency key is set.
    pub fn idempotent_hit(mut self, hit: bool) -> Self {
        self.idempotent_hit = Some(hit);
        self
    }

    pub fn build(self) -> TaskResult {
        let idempotent_hit = self
            .idempotent_hit
            .unwrap_or(self.idempotent_key.is_some());
        TaskResult {
            status: self.status,
            start_time: self.start_time,
            duration: self.duration,
            error_message: self.error_message,
            error: self.error,
            output: self.output,
            idempotent_key: self.idempotent_key,
            idempotent_hit,
        }
    }

    /// Convenience for processors: `Ok(Some(result))`.
    pub fn into_outcome(self) -> crate::tasks::ProcessOutcome {
        Ok(Some(self.build()))
    }
}
