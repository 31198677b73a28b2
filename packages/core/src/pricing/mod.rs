//! Dynamic Pricing Module
//!
//! Turns a base per-GB rate into a quote by applying a demand multiplier
//! and a distance-bucket multiplier. Quotes are frozen once attached to a
//! connection.

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::{DemandFactors, LocationFactors, PricingConfig};
pub use engine::{round3, PricingEngine};
pub use error::PricingError;
pub use types::*;
