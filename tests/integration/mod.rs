mod degradation_test;
mod health_test;
mod ledger_flow;
mod outbox_relay_test;
#[cfg(feature = "sqlite")]
mod sea_orm_store_test;
