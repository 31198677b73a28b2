//! Configuration for the pricing engine

use serde::{Deserialize, Serialize};

use crate::pricing::error::PricingError;
use crate::pricing::types::{DemandLevel, LocationBucket};

/// Session-wide pricing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingConfig {
    /// Currency units per GB
    pub base_rate: f64,
    pub demand_factors: DemandFactors,
    pub location_factors: LocationFactors,
}

/// Multipliers keyed by demand level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandFactors {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

/// Multipliers keyed by distance bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFactors {
    pub near: f64,
    pub medium: f64,
    pub far: f64,
}

impl DemandFactors {
    pub fn factor(&self, demand: DemandLevel) -> f64 {
        match demand {
            DemandLevel::Low => self.low,
            DemandLevel::Medium => self.medium,
            DemandLevel::High => self.high,
        }
    }
}

impl LocationFactors {
    pub fn factor(&self, bucket: LocationBucket) -> f64 {
        match bucket {
            LocationBucket::Near => self.near,
            LocationBucket::Medium => self.medium,
            LocationBucket::Far => self.far,
        }
    }
}

impl PricingConfig {
    /// Check `base_rate > 0` and every factor `>= 1.0`.
    pub fn validate(&self) -> Result<(), PricingError> {
        if !self.base_rate.is_finite() || self.base_rate <= 0.0 {
            return Err(PricingError::validation(format!(
                "base rate must be positive, got {}",
                self.base_rate
            )));
        }

        let factors = [
            ("demand.low", self.demand_factors.low),
            ("demand.medium", self.demand_factors.medium),
            ("demand.high", self.demand_factors.high),
            ("location.near", self.location_factors.near),
            ("location.medium", self.location_factors.medium),
            ("location.far", self.location_factors.far),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value < 1.0 {
                return Err(PricingError::validation(format!(
                    "{} factor must be >= 1.0, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Same factors, different base rate.
    pub fn with_base_rate(mut self, base_rate: f64) -> Self {
        self.base_rate = base_rate;
        self
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.05,
            demand_factors: DemandFactors::default(),
            location_factors: LocationFactors::default(),
        }
    }
}

impl Default for DemandFactors {
    fn default() -> Self {
        Self {
            low: 1.0,
            medium: 1.5,
            high: 2.5,
        }
    }
}

impl Default for LocationFactors {
    fn default() -> Self {
        Self {
            near: 1.0,
            medium: 1.3,
            far: 1.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PricingConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_base_rate_is_rejected() {
        let config = PricingConfig::default().with_base_rate(0.0);
        assert!(matches!(config.validate(), Err(PricingError::Validation { .. })));
    }

    #[test]
    fn factor_below_one_is_rejected() {
        let mut config = PricingConfig::default();
        config.location_factors.far = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("location.far"));
    }

    #[test]
    fn nan_factor_is_rejected() {
        let mut config = PricingConfig::default();
        config.demand_factors.medium = f64::NAN;
        assert!(config.validate().is_err());
    }
}
