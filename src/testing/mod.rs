//! Test doubles and wiring shared by unit and integration tests

mod flaky;
pub mod setup;

pub use flaky::FlakyCache;
pub use setup::TestStack;
