use std::env;
use std::str::FromStr;

use crate::ledger::DEFAULT_GB_PER_HOUR;
use crate::nodes::GeoPoint;

pub const DEFAULT_BASE_RATE: f64 = 0.05;
pub const DEFAULT_TICK_SECONDS: u64 = 3;
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_rate: f64,
    pub tick_seconds: u64,
    pub gb_per_hour: f64,
    pub currency: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    /// Payment backend. The simulated processor is used when unset.
    pub payments_base_url: Option<String>,
    pub payments_api_key: Option<String>,
    /// JSON node list; the built-in demo directory is used when unset.
    pub nodes_file: Option<String>,
    /// Where the device is. Node distances are recomputed from here when set.
    pub origin: Option<GeoPoint>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            base_rate: parse_or(&get, "PEERSHARE_BASE_RATE", DEFAULT_BASE_RATE)?,
            tick_seconds: parse_or(&get, "PEERSHARE_TICK_SECONDS", DEFAULT_TICK_SECONDS)?,
            gb_per_hour: parse_or(&get, "PEERSHARE_GB_PER_HOUR", DEFAULT_GB_PER_HOUR)?,
            currency: get("PEERSHARE_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            payments_base_url: get("PAYMENTS_BASE_URL"),
            payments_api_key: get("PAYMENTS_API_KEY"),
            nodes_file: get("PEERSHARE_NODES_FILE"),
            origin: get("PEERSHARE_ORIGIN").map(|raw| parse_origin(&raw)).transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Range checks, rerun after CLI overrides are applied.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_rate.is_finite() && self.base_rate > 0.0) {
            return Err("base rate must be greater than zero".into());
        }
        if self.tick_seconds == 0 {
            return Err("tick interval must be at least 1 second".into());
        }
        if !(self.gb_per_hour.is_finite() && self.gb_per_hour >= 0.0) {
            return Err("GB per hour must be a non-negative number".into());
        }
        Ok(())
    }
}

/// Parse `"<latitude>,<longitude>"` in decimal degrees.
pub fn parse_origin(raw: &str) -> Result<GeoPoint, String> {
    let invalid = || format!("origin must be \"<latitude>,<longitude>\", got {:?}", raw);
    let (lat, lon) = raw.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok(GeoPoint { latitude, longitude })
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
