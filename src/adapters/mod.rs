//! Circuit-breaker-wrapped access to the three backing dependencies
//!
//! Each adapter owns one breaker per dependency handle and reports failures to
//! the [`DegradationCoordinator`](crate::resilience::DegradationCoordinator).
//! No raw technical error leaves an adapter: it is either absorbed by a
//! fallback or converted into a [`LedgerError`](crate::error::LedgerError).

mod cache;
mod event_channel;
mod ledger_store;

pub use cache::CacheAdapter;
pub use event_channel::{EventChannelAdapter, PublishOutcome};
pub use ledger_store::{LedgerStoreAdapter, ReadSource};
