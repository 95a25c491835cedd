//! Transactional outbox relay
//!
//! Staging happens inside the store's [`UnitOfWork`](crate::store::UnitOfWork);
//! this module only moves staged records to the event channel.

mod relay;

pub use relay::{OutboxRelay, RelayCycle};
