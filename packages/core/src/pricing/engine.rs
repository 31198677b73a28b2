//! Pricing Engine - computes per-GB quotes

use crate::pricing::{
    config::PricingConfig,
    error::PricingError,
    types::{DemandLevel, LocationBucket, PricingQuote},
};

/// Round to three decimal places, half away from zero.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Stateless quoting over a validated [`PricingConfig`]
#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    /// Create an engine, rejecting configs with a non-positive base rate or
    /// a factor below 1.0.
    pub fn new(config: PricingConfig) -> Result<Self, PricingError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Quote a per-GB rate for a peer `distance_km` away at the given demand.
    pub fn quote(&self, distance_km: f64, demand: DemandLevel) -> Result<PricingQuote, PricingError> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(PricingError::validation(format!(
                "distance must be a non-negative number of km, got {}",
                distance_km
            )));
        }

        let bucket = LocationBucket::from_distance(distance_km);
        let demand_multiplier = self.config.demand_factors.factor(demand);
        let location_multiplier = self.config.location_factors.factor(bucket);
        let base_rate = self.config.base_rate;

        Ok(PricingQuote {
            base_rate,
            demand_multiplier,
            location_multiplier,
            current_rate: round3(base_rate * demand_multiplier * location_multiplier),
        })
    }

    /// Like [`quote`](Self::quote) with the demand level given as text.
    pub fn quote_str(&self, distance_km: f64, demand: &str) -> Result<PricingQuote, PricingError> {
        let demand: DemandLevel = demand.parse()?;
        self.quote(distance_km, demand)
    }

    /// Get engine configuration
    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Swap in a new configuration. Existing quotes are unaffected.
    pub fn set_config(&mut self, config: PricingConfig) -> Result<(), PricingError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self {
            config: PricingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_high_demand(high: f64) -> PricingEngine {
        let mut config = PricingConfig::default();
        config.demand_factors.high = high;
        PricingEngine::new(config).unwrap()
    }

    #[test]
    fn near_high_demand_rate_rounds_to_three_decimals() {
        let engine = PricingEngine::default();
        let quote = engine.quote(1.0, DemandLevel::High).unwrap();
        assert_eq!(quote.current_rate, 0.125);
        assert_eq!(quote.location_multiplier, 1.0);
    }

    #[test]
    fn far_high_demand_worked_example() {
        let engine = engine_with_high_demand(2.0);
        let quote = engine.quote(5.7, DemandLevel::High).unwrap();
        assert_eq!(quote.location_multiplier, 1.8);
        assert_eq!(quote.current_rate, 0.18);
    }

    #[test]
    fn medium_bucket_uses_medium_factor() {
        let engine = PricingEngine::default();
        let quote = engine.quote(2.3, DemandLevel::Low).unwrap();
        assert_eq!(quote.location_multiplier, 1.3);
        assert_eq!(quote.demand_multiplier, 1.0);
        assert_eq!(quote.current_rate, 0.065);
    }

    #[test]
    fn negative_distance_is_rejected() {
        let engine = PricingEngine::default();
        let err = engine.quote(-0.1, DemandLevel::Low).unwrap_err();
        assert!(matches!(err, PricingError::Validation { .. }));
    }

    #[test]
    fn infinite_distance_is_rejected() {
        let engine = PricingEngine::default();
        assert!(engine.quote(f64::INFINITY, DemandLevel::Low).is_err());
    }

    #[test]
    fn quote_str_rejects_unknown_demand() {
        let engine = PricingEngine::default();
        assert!(engine.quote_str(1.0, "surge").is_err());
        assert!(engine.quote_str(1.0, "medium").is_ok());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = PricingConfig::default().with_base_rate(-1.0);
        assert!(PricingEngine::new(config).is_err());
    }

    #[test]
    fn set_config_keeps_old_config_on_error() {
        let mut engine = PricingEngine::default();
        let bad = PricingConfig::default().with_base_rate(0.0);
        assert!(engine.set_config(bad).is_err());
        assert_eq!(engine.config().base_rate, 0.05);
    }

    #[test]
    fn round3_rounds_half_away_from_zero() {
        assert_eq!(round3(0.0005), 0.001);
        assert_eq!(round3(0.0004), 0.0);
        assert_eq!(round3(1.2344), 1.234);
    }
}
