pub mod health;
pub mod ledger;

pub use health::{DegradationStatus, LivenessResponse, ReadinessResponse};
pub use ledger::{BalanceView, HistoricalBalance, TransactionReceipt};
