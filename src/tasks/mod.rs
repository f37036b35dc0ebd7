//! # Task abstractions and per-attempt values.
//!
//! This module provides the core task-related types:
//! - [`TaskContext`] - immutable per-attempt execution context
//! - [`TaskResult`] - immutable outcome of one attempt
//! - [`TaskProcessor`] - trait for implementing async cancelable units of work
//! - [`ProcessorFn`] - function-backed processor implementation
//! - [`ProcessorRef`] - shared reference to a processor (`Arc<dyn TaskProcessor>`)

mod context;
mod processor;
mod processor_fn;
mod result;

pub use context::{TaskContext, TaskContextBuilder, DEFAULT_TIMEOUT};
pub use processor::{ProcessOutcome, ProcessorRef, TaskProcessor};
pub use processor_fn::ProcessorFn;
pub use result::{TaskResult, TaskResultBuilder, TaskStatus};
