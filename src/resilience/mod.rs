//! Fault isolation for processors that call unreliable dependencies.
//!
//! - [`CircuitBreaker`] failure-rate breaker with `Closed`/`Open`/`HalfOpen` states
//! - [`CircuitBreakers`] named breakers created on demand, with `call` helpers
//! - [`GuardedProcessor`] puts a breaker in front of any processor
//!
//! Retries and breakers compose: the template retries, the breaker decides whether
//! an attempt reaches the dependency at all.

mod circuit_breaker;
mod config;
mod guarded;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerError, CircuitBreakerSnapshot, CircuitBreakers,
    CircuitState,
};
pub use config::CircuitBreakerConfig;
pub use guarded::GuardedProcessor;
