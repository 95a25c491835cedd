pub mod ledger;

pub use ledger::{CreateWalletRequest, DepositRequest, TransferRequest, WithdrawRequest};
