//! Accrual & Settlement Ledger
//!
//! Tracks per-connection usage and cost/earnings on each tick, and keeps the
//! transaction history with its running totals.

pub mod accrual;
pub mod aggregate;
pub mod error;
pub mod transaction;
pub mod types;

pub use accrual::{AccrualLedger, DEFAULT_GB_PER_HOUR};
pub use aggregate::{AggregateLedger, Totals, MINIMUM_WITHDRAWAL};
pub use error::LedgerError;
pub use transaction::{PaymentTransaction, TransactionKind, TransactionStatus};
pub use types::*;
