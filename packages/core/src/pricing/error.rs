//! Error types for pricing operations

use thiserror::Error;

/// Errors raised while validating pricing inputs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl PricingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }
}
