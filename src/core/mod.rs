//! Runtime core: retry orchestration and attempt execution.
//!
//! The public API from this module is [`RetryTemplate`] (plus its builder),
//! the [`WorkerPool`] it runs timed attempts on, and the [`Config`] both are
//! sized from.
//!
//! Internal modules:
//! - [`runner`]: executes one attempt with timeout, cancellation and panic capture;
//! - [`template`]: the retry loop (classify, record, consult policy, sleep);
//! - [`pool`]: bounded worker slots with a saturation policy;
//! - [`builder`]: wires config, pool and collectors together;
//! - [`config`]: runtime settings with sentinel accessors.

mod builder;
mod config;
mod pool;
mod runner;
mod template;

pub use builder::RetryTemplateBuilder;
pub use config::{Config, Saturation};
pub use pool::WorkerPool;
pub use template::RetryTemplate;

pub(crate) use config::millis;
