pub mod entry;
pub mod event;
pub mod outbox;
pub mod wallet;

pub use entry::{EntryStatus, EntryType, LedgerEntry};
pub use event::LedgerEvent;
pub use outbox::OutboxRecord;
pub use wallet::{Currency, Wallet, WalletStatus};
