//! # Execution metrics for the retry runtime.
//!
//! This module provides the [`MetricsCollector`] trait and built-in implementations.
//! The [`RetryTemplate`](crate::RetryTemplate) reports every attempt to a
//! [`CollectorSet`], which fans out to each configured collector.
//!
//! ## Architecture
//! ```text
//! Attempt flow:
//!   RetryTemplate ── record(name, &TaskResult, retries) ──► CollectorSet
//!                                                              │
//!                                                    ┌─────────┼──────────┐
//!                                                    ▼         ▼          ▼
//!                                            InMemoryMetrics LogWriter  Custom
//! ```
//!
//! ## Collector types
//! - [`InMemoryMetrics`] per-processor counters with a serializable snapshot
//! - [`LogWriter`] structured `tracing` output per attempt (feature `logging`)

mod collector;
mod memory;
mod set;

#[cfg(feature = "logging")]
mod log;

pub use collector::MetricsCollector;
pub use memory::{InMemoryMetrics, ProcessorMetrics};
pub use set::CollectorSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
