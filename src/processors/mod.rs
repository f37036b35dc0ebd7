//! Processor lookup by name and version.
//!
//! Hosts that dispatch work by processor name (from a job table, a queue message,
//! an admin request) register their processors once in a [`ProcessorRegistry`] and
//! resolve them per execution before handing them to the
//! [`RetryTemplate`](crate::RetryTemplate).

mod registry;

pub use registry::{ProcessorInfo, ProcessorRegistry, ProcessorStats, DEFAULT_VERSION};
