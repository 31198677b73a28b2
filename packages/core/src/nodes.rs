//! Discovered network nodes.
//!
//! Nodes arrive as JSON from discovery and are validated here before the
//! rest of the crate sees them. The directory is a static snapshot.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::settings::ShareSettings;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

/// Advertised capacity in Mbps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeBandwidth {
    pub upload: f64,
    pub download: f64,
}

/// A peer advertising bandwidth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkNode {
    pub id: String,
    pub name: String,
    pub location: NodeLocation,
    pub available: bool,
    pub bandwidth: NodeBandwidth,
    /// 0.0 to 5.0
    pub rating: f64,
    /// Lifetime GB shared
    pub total_shared: f64,
    /// Advertised price per GB. Independent of the pricing engine.
    pub price: f64,
    #[serde(default, rename = "distance")]
    pub distance_km: Option<f64>,
}

impl NetworkNode {
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |what: String| -> Result<(), AppError> {
            Err(AppError::Parse(format!("node {}: {}", self.id, what)))
        };

        if self.id.trim().is_empty() {
            return Err(AppError::Parse("node with empty id".to_string()));
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return invalid(format!("rating {} outside 0-5", self.rating));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return invalid(format!("price {} must be positive", self.price));
        }
        if !non_negative(self.total_shared) {
            return invalid(format!("total shared {} is invalid", self.total_shared));
        }
        if !non_negative(self.bandwidth.upload) || !non_negative(self.bandwidth.download) {
            return invalid(format!(
                "bandwidth {}/{} is invalid",
                self.bandwidth.upload, self.bandwidth.download
            ));
        }
        if let Some(distance) = self.distance_km {
            if !non_negative(distance) {
                return invalid(format!("distance {} is invalid", distance));
            }
        }
        Ok(())
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Great-circle distance in km.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[derive(Debug, Clone, Default)]
pub struct NodeDirectory {
    nodes: Vec<NetworkNode>,
}

impl NodeDirectory {
    /// Build a directory, validating every node.
    pub fn new(nodes: Vec<NetworkNode>) -> Result<Self, AppError> {
        for node in &nodes {
            node.validate()?;
        }
        Ok(Self { nodes })
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let nodes: Vec<NetworkNode> =
            serde_json::from_str(json).map_err(|err| AppError::Parse(err.to_string()))?;
        Self::new(nodes)
    }

    /// Fill in each node's distance from `origin`, to 0.1 km.
    pub fn with_distances_from(mut self, origin: &GeoPoint) -> Self {
        for node in &mut self.nodes {
            let at = GeoPoint {
                latitude: node.location.latitude,
                longitude: node.location.longitude,
            };
            node.distance_km = Some((haversine_km(origin, &at) * 10.0).round() / 10.0);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn all(&self) -> &[NetworkNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Available nodes inside the share radius and price range, nearest
    /// first. Nodes with unknown distance sort last.
    pub fn discover(&self, settings: &ShareSettings) -> Vec<&NetworkNode> {
        let mut found: Vec<&NetworkNode> = self
            .nodes
            .iter()
            .filter(|n| n.available)
            .filter(|n| n.price >= settings.min_price && n.price <= settings.max_price)
            .filter(|n| n.distance_km.map_or(true, |d| d <= settings.share_radius_km))
            .collect();

        found.sort_by(|a, b| {
            let da = a.distance_km.unwrap_or(f64::INFINITY);
            let db = b.distance_km.unwrap_or(f64::INFINITY);
            da.total_cmp(&db)
        });
        found
    }

    /// Nodes seen in the San Francisco demo area.
    pub fn demo() -> Self {
        let node = |id: &str, name: &str, lat: f64, lon: f64, address: &str, available: bool, mbps: f64, rating: f64, shared: f64, price: f64, distance: f64| NetworkNode {
            id: id.to_string(),
            name: name.to_string(),
            location: NodeLocation {
                latitude: lat,
                longitude: lon,
                address: address.to_string(),
            },
            available,
            bandwidth: NodeBandwidth {
                upload: mbps,
                download: mbps,
            },
            rating,
            total_shared: shared,
            price,
            distance_km: Some(distance),
        };

        Self {
            nodes: vec![
                node("node-001", "FastNet Hub", 37.7649, -122.4294, "789 Valencia St, San Francisco, CA", true, 100.0, 4.8, 1250.5, 0.08, 1.2),
                node("node-002", "CloudShare Point", 37.7949, -122.3994, "321 Howard St, San Francisco, CA", true, 50.0, 4.5, 850.2, 0.06, 3.8),
                node("node-003", "MegaSpeed Network", 37.8049, -122.4394, "555 Folsom St, San Francisco, CA", true, 200.0, 4.9, 2100.8, 0.12, 6.5),
                node("node-004", "QuickLink Station", 37.7549, -122.4494, "888 Bryant St, San Francisco, CA", false, 75.0, 4.3, 620.3, 0.07, 2.9),
            ],
        }
    }
}
