//! SeaORM-backed relational store
//!
//! [`SeaOrmLedgerStore`] implements [`LedgerStore`](crate::store::LedgerStore)
//! for Postgres or SQLite; [`connect`] opens the pool and applies migrations.

pub mod entities;
mod pool;
mod store;

pub use pool::connect;
pub use store::SeaOrmLedgerStore;
