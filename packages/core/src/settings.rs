//! User-facing sharing preferences

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_CONNECTIONS_RANGE: (u32, u32) = (1, 10);
pub const MAX_BANDWIDTH_RANGE: (u32, u32) = (10, 1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Wifi,
    Cellular,
    Ethernet,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Wifi => "wifi",
            NetworkType::Cellular => "cellular",
            NetworkType::Ethernet => "ethernet",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Price range {min}..{max} is invalid")]
    PriceRange { min: f64, max: f64 },

    #[error("Share radius {0} is invalid")]
    ShareRadius(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareSettings {
    /// Connect to the nearest discovered node when nothing is being consumed
    pub auto_connect: bool,
    pub max_connections: u32,
    /// Ceiling applied to sampled throughput, in Mbps
    pub max_bandwidth_mbps: u32,
    /// Cheapest node price to consider, per GB
    pub min_price: f64,
    /// Dearest node price to consider, per GB
    pub max_price: f64,
    pub share_radius_km: f64,
    pub allowed_network_types: Vec<NetworkType>,
}

impl ShareSettings {
    /// Clamp connection and bandwidth limits into their allowed ranges.
    pub fn normalized(mut self) -> Self {
        self.max_connections = self
            .max_connections
            .clamp(MAX_CONNECTIONS_RANGE.0, MAX_CONNECTIONS_RANGE.1);
        self.max_bandwidth_mbps = self
            .max_bandwidth_mbps
            .clamp(MAX_BANDWIDTH_RANGE.0, MAX_BANDWIDTH_RANGE.1);
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.min_price >= 0.0 && self.min_price <= self.max_price) {
            return Err(SettingsError::PriceRange {
                min: self.min_price,
                max: self.max_price,
            });
        }
        if !self.share_radius_km.is_finite() || self.share_radius_km < 0.0 {
            return Err(SettingsError::ShareRadius(self.share_radius_km));
        }
        Ok(())
    }

    /// Sharing is only allowed on these network types.
    pub fn allows(&self, network: NetworkType) -> bool {
        self.allowed_network_types.contains(&network)
    }
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            auto_connect: false,
            max_connections: 5,
            max_bandwidth_mbps: 100,
            min_price: 0.03,
            max_price: 0.20,
            share_radius_km: 10.0,
            allowed_network_types: vec![NetworkType::Wifi, NetworkType::Ethernet],
        }
    }
}
