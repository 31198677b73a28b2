//! Connection records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::PricingQuote;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Which side of the bandwidth exchange this node is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// We share bandwidth and earn.
    Provider,
    /// We receive bandwidth and pay.
    Consumer,
}

/// Link quality as reported by the network layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Where the peer is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    /// Kilometres from us
    pub distance_km: f64,
}

/// The peer side of a new connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub peer_id: String,
    pub peer_name: String,
    pub location: PeerLocation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandwidthUsage {
    /// Mbps
    pub upload: f64,
    /// Mbps
    pub download: f64,
    /// GB accrued so far
    pub total: f64,
}

/// Money accrued on a connection. Providers earn, consumers pay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Accrual {
    Earnings(f64),
    Cost(f64),
}

impl Accrual {
    pub fn zero_for(connection_type: ConnectionType) -> Self {
        match connection_type {
            ConnectionType::Provider => Accrual::Earnings(0.0),
            ConnectionType::Consumer => Accrual::Cost(0.0),
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Accrual::Earnings(amount) | Accrual::Cost(amount) => *amount,
        }
    }

    /// Same variant, new amount.
    pub fn with_amount(&self, amount: f64) -> Self {
        match self {
            Accrual::Earnings(_) => Accrual::Earnings(amount),
            Accrual::Cost(_) => Accrual::Cost(amount),
        }
    }
}

/// One active or historical peer relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub peer_id: String,
    pub peer_name: String,
    pub peer_location: PeerLocation,
    pub status: ConnectionStatus,
    pub connection_type: ConnectionType,
    pub bandwidth: BandwidthUsage,
    /// Locked-in quote
    pub pricing: PricingQuote,
    #[serde(flatten)]
    pub accrual: Accrual,
    pub start_time: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds accrued while connected
    pub duration: u64,
    pub quality: Quality,
}

impl Connection {
    /// A fresh record in `Connecting` with nothing accrued.
    pub fn new(
        id: impl Into<String>,
        peer: PeerInfo,
        connection_type: ConnectionType,
        pricing: PricingQuote,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            peer_id: peer.peer_id,
            peer_name: peer.peer_name,
            peer_location: peer.location,
            status: ConnectionStatus::Connecting,
            connection_type,
            bandwidth: BandwidthUsage::default(),
            pricing,
            accrual: Accrual::zero_for(connection_type),
            start_time,
            ended_at: None,
            duration: 0,
            quality: Quality::Good,
        }
    }

    pub fn earnings(&self) -> Option<f64> {
        match self.accrual {
            Accrual::Earnings(amount) => Some(amount),
            Accrual::Cost(_) => None,
        }
    }

    pub fn cost(&self) -> Option<f64> {
        match self.accrual {
            Accrual::Cost(amount) => Some(amount),
            Accrual::Earnings(_) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        )
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn peer(id: &str, distance_km: f64) -> PeerInfo {
        PeerInfo {
            peer_id: format!("peer-{}", id),
            peer_name: format!("Peer {}", id),
            location: PeerLocation {
                latitude: 37.7749,
                longitude: -122.4194,
                address: "123 Market St, San Francisco, CA".to_string(),
                distance_km,
            },
        }
    }

    pub fn quote(current_rate: f64) -> PricingQuote {
        PricingQuote {
            base_rate: 0.05,
            demand_multiplier: 1.0,
            location_multiplier: 1.0,
            current_rate,
        }
    }

    pub fn consumer(current_rate: f64) -> Connection {
        Connection::new("1", peer("1", 2.3), ConnectionType::Consumer, quote(current_rate), Utc::now())
    }

    pub fn provider(current_rate: f64) -> Connection {
        Connection::new("2", peer("2", 0.4), ConnectionType::Provider, quote(current_rate), Utc::now())
    }
}
