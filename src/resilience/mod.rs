//! Resilience primitives shared by every resource adapter
//!
//! - **Circuit Breaker**: per-dependency rolling-window breaker that fails fast
//!   while a dependency is unhealthy.
//! - **Retry**: bounded retries with randomized backoff for retryable technical
//!   failures such as version conflicts.
//! - **Failure windows**: sliding time counters that detect recurring failures.
//! - **Degradation coordinator**: the process-wide set of degraded modes.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use wallet_ledger::resilience::{CircuitBreaker, CircuitBreakerConfig, DegradationCoordinator};
//!
//! # async fn example() {
//! let coordinator = Arc::new(DegradationCoordinator::new());
//! let cb = CircuitBreaker::with_config("cache", CircuitBreakerConfig::default())
//!     .with_observer(coordinator.clone());
//!
//! let result = cb.call(async { Ok::<_, std::io::Error>(()) }).await;
//! assert!(result.is_ok());
//! # }
//! ```

mod circuit_breaker;
mod degradation;
mod retry;
mod window;

pub use circuit_breaker::{
    BreakerStatus, BreakerTransition, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError,
    CircuitState, TransitionObserver,
};
pub use degradation::{
    DegradationCoordinator, DegradationSnapshot, DegradedMode, HealthLevel, ModeState,
};
pub use retry::RetryPolicy;
pub use window::{FailurePatterns, FailureWindow, KeyedFailureWindow};
