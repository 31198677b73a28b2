// Library root. Exposes the pricing and accrual core for the binary in
// `src/main.rs` and the integration tests in `tests/`.

pub mod bandwidth;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod nodes;
pub mod pricing;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod settings;

// Binary-only plumbing, public so the CLI parsing can be tested.
pub mod cli;
pub mod config;
pub mod logging;
