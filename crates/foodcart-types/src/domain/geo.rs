use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG), kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Parses the `"lon lat"` form geocoders return for a point.
    pub fn from_pos(pos: &str) -> Option<Self> {
        let mut parts = pos.split_whitespace();
        let lon = parts.next()?.parse::<f64>().ok()?;
        let lat = parts.next()?.parse::<f64>().ok()?;
        if parts.next().is_some() || !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        Some(Self { lon, lat })
    }
}

/// A resolved address as kept by the geocode cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeEntry {
    pub address: String,
    pub coordinate: Coordinate,
    pub created_at: DateTime<Utc>,
}

impl GeocodeEntry {
    pub fn new(address: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            address: address.into(),
            coordinate,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, policy: &CachePolicy, now: DateTime<Utc>) -> bool {
        match policy.ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()) {
            // An expiry past the representable range never comes.
            Some(ttl) => self
                .created_at
                .checked_add_signed(ttl)
                .is_some_and(|expires_at| expires_at <= now),
            None => false,
        }
    }
}

/// Eviction rules for the geocode cache. `None` disables the respective limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Option<Duration>,
    pub max_entries: Option<u64>,
}

impl CachePolicy {
    /// Longest TTL accepted from configuration.
    pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

    pub const fn unbounded() -> Self {
        Self {
            ttl: None,
            max_entries: None,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(30 * 24 * 60 * 60)),
            max_entries: Some(10_000),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GeocodeError {
    #[error("address not found: {0}")]
    AddressNotFound(String),
    #[error("geocoder unavailable: {0}")]
    Unavailable(String),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceError {
    #[error("distance could not be determined: missing coordinates")]
    MissingCoordinates,
}

/// Great-circle distance in kilometres.
pub fn distance_km(a: Option<Coordinate>, b: Option<Coordinate>) -> Result<f64, DistanceError> {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(DistanceError::MissingCoordinates),
    };
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    Ok(2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin())
}
