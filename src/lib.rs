#![deny(warnings)]

#[macro_use(get)]
extern crate actix_web;

pub mod adapters;
pub mod cache;
pub mod channel;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod outbox;
pub mod requests;
pub mod resilience;
pub mod responses;
pub mod router;
pub mod services;
pub mod store;
pub mod telemetry;

// Testing utilities (always available for integration tests)
pub mod testing;

// Re-export commonly used types for convenience
pub use cache::{AnyCache, Cache, CacheKey, CacheStats, HybridCache, LocalCache, NullCache};
#[cfg(feature = "redis-cache")]
pub use cache::RedisCache;
pub use error::{ErrorKind, LedgerError};
pub use metrics::AppMetrics;
pub use services::{HealthReporter, LedgerDependencies, LedgerFacade};
