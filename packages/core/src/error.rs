use thiserror::Error;

use crate::ledger::LedgerError;
use crate::pricing::PricingError;
use crate::services::{AiServiceError, ProcessorError};

/// Unified application error.
///
/// Domain errors keep their own types; this wraps them for the binary
/// alongside config and parse failures.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error(transparent)]
    Ai(#[from] AiServiceError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
