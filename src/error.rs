//! Error types used by the retry runtime and task processors.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] precondition/programming errors raised synchronously by the
//!   runtime itself (blank task id, template already shut down, bad registry input).
//! - [`TaskError`] errors produced by a single attempt. These never escape
//!   [`RetryTemplate::execute`](crate::RetryTemplate::execute); they are folded into
//!   the returned [`TaskResult`](crate::TaskResult).
//!
//! Both types provide `as_label` for logging/metrics; [`TaskError::as_message`] gives
//! a category-prefixed description.

use std::{error::Error as StdError, fmt, sync::Arc, time::Duration};

use thiserror::Error;

/// # Errors produced by the runtime.
///
/// These represent misuse of the API rather than task failures, so they are
/// returned before any attempt is made.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A [`TaskContext`](crate::TaskContext) was built with an empty or blank task id.
    #[error("task id must not be empty")]
    InvalidTaskId,

    /// The template (and its worker pool) has been shut down.
    #[error("retry template has been shut down")]
    Shutdown,

    /// Graceful shutdown timed out while attempts were still running.
    #[error("shutdown grace {grace:?} exceeded; {in_flight} attempt(s) still running")]
    GraceExceeded {
        /// The configured grace period.
        grace: Duration,
        /// Workers still holding a pool slot when the grace period ran out.
        in_flight: usize,
    },

    /// Processor name is empty or contains characters outside `[A-Za-z0-9_.-]`.
    #[error("processor name {name:?} is invalid; only letters, digits, '_', '-' and '.' are allowed")]
    InvalidProcessorName {
        /// The rejected name.
        name: String,
    },

    /// Processor version contains characters outside `[A-Za-z0-9_.-]`.
    #[error("processor version {version:?} contains invalid characters")]
    InvalidProcessorVersion {
        /// The rejected version.
        version: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// A processor is already registered under this name and version.
    #[error("processor {name:?} version {version:?} already registered; use allow_overwrite to replace")]
    DuplicateProcessor {
        /// Normalized processor name.
        name: String,
        /// Normalized processor version.
        version: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use retrykit::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::Shutdown.as_label(), "runtime_shutdown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidTaskId => "runtime_invalid_task_id",
            RuntimeError::Shutdown => "runtime_shutdown",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::InvalidProcessorName { .. } => "runtime_invalid_processor_name",
            RuntimeError::InvalidProcessorVersion { .. } => "runtime_invalid_processor_version",
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
            RuntimeError::DuplicateProcessor { .. } => "runtime_duplicate_processor",
        }
    }
}

/// Coarse classification of a [`TaskError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The processor returned an error or panicked.
    Processing,
    /// The attempt did not finish within its effective timeout.
    Timeout,
    /// The processor finished without producing a result.
    NullResult,
    /// The worker pool was saturated and configured to reject.
    Rejected,
    /// The execution was interrupted by shutdown or caller cancellation.
    Interrupted,
    /// A circuit breaker refused the attempt.
    CircuitOpen,
}

/// Shared, type-erased error cause.
pub type BoxError = Arc<dyn StdError + Send + Sync + 'static>;

/// # Errors produced by a single attempt.
///
/// `TaskError` is `Clone` so it can be stored inside a [`TaskResult`](crate::TaskResult)
/// and handed to a [`RetryPolicy`](crate::RetryPolicy) without giving up ownership.
#[non_exhaustive]
#[derive(Error, Clone)]
pub enum TaskError {
    /// The processor failed. The message becomes the result's `error_message`.
    #[error("{message}")]
    Processing {
        /// Human-readable failure message.
        message: String,
        /// Optional underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// The attempt exceeded its timeout.
    #[error("Task timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The processor completed without a result.
    #[error("Task returned null result")]
    NullResult,

    /// The bounded worker pool had no free slot.
    #[error("worker pool saturated (limit {limit}); attempt rejected")]
    Rejected {
        /// Configured worker limit.
        limit: usize,
    },

    /// The execution was interrupted before it could finish.
    #[error("Task interrupted: {reason}")]
    Interrupted {
        /// Why the execution stopped.
        reason: String,
    },

    /// The circuit breaker guarding the processor is open.
    #[error("circuit breaker {name:?} is open")]
    CircuitOpen {
        /// Breaker name.
        name: String,
    },
}

impl TaskError {
    /// Creates a processing error from a message.
    pub fn processing(message: impl Into<String>) -> Self {
        TaskError::Processing {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error as a processing error, keeping it as the source.
    ///
    /// # Example
    /// ```
    /// use retrykit::{ErrorKind, TaskError};
    ///
    /// let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
    /// let err = TaskError::wrap(io);
    /// assert_eq!(err.kind(), ErrorKind::Processing);
    /// assert_eq!(err.to_string(), "disk on fire");
    /// ```
    pub fn wrap<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        TaskError::Processing {
            message: err.to_string(),
            source: Some(Arc::new(err)),
        }
    }

    pub(crate) fn interrupted(reason: impl Into<String>) -> Self {
        TaskError::Interrupted {
            reason: reason.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Processing { .. } => ErrorKind::Processing,
            TaskError::Timeout { .. } => ErrorKind::Timeout,
            TaskError::NullResult => ErrorKind::NullResult,
            TaskError::Rejected { .. } => ErrorKind::Rejected,
            TaskError::Interrupted { .. } => ErrorKind::Interrupted,
            TaskError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use retrykit::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Processing => "task_failed",
            ErrorKind::Timeout => "task_timeout",
            ErrorKind::NullResult => "task_null_result",
            ErrorKind::Rejected => "task_rejected",
            ErrorKind::Interrupted => "task_interrupted",
            ErrorKind::CircuitOpen => "task_circuit_open",
        }
    }

    /// Returns a short human-readable description, prefixed by category.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Processing { message, .. } => format!("error: {message}"),
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::NullResult => "null result".to_string(),
            TaskError::Rejected { limit } => format!("rejected: pool limit {limit}"),
            TaskError::Interrupted { reason } => format!("interrupted: {reason}"),
            TaskError::CircuitOpen { name } => format!("circuit open: {name}"),
        }
    }

    /// True for errors that end an attempt with a `Cancelled` status.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Interrupted)
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Processing { message, source } => f
                .debug_struct("Processing")
                .field("message", message)
                .field("source", &source.as_ref().map(|s| s.to_string()))
                .finish(),
            TaskError::Timeout { timeout } => {
                f.debug_struct("Timeout").field("timeout", timeout).finish()
            }
            TaskError::NullResult => f.write_str("NullResult"),
            TaskError::Rejected { limit } => {
                f.debug_struct("Rejected").field("limit", limit).finish()
            }
            TaskError::Interrupted { reason } => {
                f.debug_struct("Interrupted").field("reason", reason).finish()
            }
            TaskError::CircuitOpen { name } => {
                f.debug_struct("CircuitOpen").field("name", name).finish()
            }
        }
    }
}
