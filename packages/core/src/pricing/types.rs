//! Core data types for pricing

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pricing::error::PricingError;

/// Coarse demand level applied as a multiplier on the base rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandLevel {
    Low,
    Medium,
    High,
}

impl DemandLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemandLevel::Low => "low",
            DemandLevel::Medium => "medium",
            DemandLevel::High => "high",
        }
    }
}

impl fmt::Display for DemandLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemandLevel {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(DemandLevel::Low),
            "medium" => Ok(DemandLevel::Medium),
            "high" => Ok(DemandLevel::High),
            other => Err(PricingError::validation(format!(
                "Unknown demand level: {}",
                other
            ))),
        }
    }
}

/// Distance bucket used to pick the location multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationBucket {
    /// `distance <= 1 km`
    Near,
    /// `1 km < distance <= 5 km`
    Medium,
    /// `distance > 5 km`
    Far,
}

impl LocationBucket {
    /// Bucket a distance in kilometres. Boundaries are exact: 1.0 is near,
    /// 5.0 is medium.
    pub fn from_distance(distance_km: f64) -> Self {
        if distance_km > 5.0 {
            LocationBucket::Far
        } else if distance_km > 1.0 {
            LocationBucket::Medium
        } else {
            LocationBucket::Near
        }
    }
}

/// A computed per-GB rate.
///
/// Derived from the engine's config at quote time. Once attached to a
/// connection it is never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuote {
    pub base_rate: f64,
    pub demand_multiplier: f64,
    pub location_multiplier: f64,
    pub current_rate: f64,
}
