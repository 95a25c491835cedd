pub mod ledger;

pub use ledger::{HealthReporter, LedgerDependencies, LedgerFacade};
