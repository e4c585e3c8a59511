//! Nearest-station resolution from GPS coordinates.
//!
//! Loads a static station list once and resolves query coordinates to the
//! minimum great-circle-distance station, producing a human-readable railway
//! context. An empty station list is a degraded-but-valid state, not an error.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LocationError;

/// Mean Earth radius in kilometers, used by the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A railway station from the static station list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRecord {
    /// Station name (e.g. "New Delhi").
    pub name: String,
    /// Optional station code (e.g. "NDLS").
    #[serde(default)]
    pub code: Option<String>,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Railway context derived from a GPS fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationContext {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    pub nearest_station: Option<String>,
    pub station_code: Option<String>,
    pub station_proximity_km: Option<f64>,
    pub railway_context: String,
    pub captured_at: DateTime<Utc>,
}

/// Immutable index over the loaded station list.
///
/// Loaded once per process; resolution is read-only and deterministic, with
/// distance ties broken by load order.
#[derive(Debug, Clone, Default)]
pub struct StationIndex {
    stations: Vec<StationRecord>,
}

impl StationIndex {
    /// Build an index from an explicit station list (mainly for tests).
    pub fn from_records(stations: Vec<StationRecord>) -> Self {
        Self { stations }
    }

    /// Load the station list from a JSON array file.
    ///
    /// A missing or unreadable file yields an empty index: resolution still
    /// works but returns a data-unavailable context.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Station data not readable, using empty index");
                return Self::default();
            }
        };

        match serde_json::from_str::<Vec<StationRecord>>(&raw) {
            Ok(stations) => {
                info!(path = %path.display(), count = stations.len(), "Station index loaded");
                Self { stations }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Station data malformed, using empty index");
                Self::default()
            }
        }
    }

    /// Number of stations in the index.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Whether the index holds no stations.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Resolve a GPS fix to its railway context.
    ///
    /// Fails only on out-of-range coordinates. With an empty index the
    /// returned context has all station fields unset and a message stating
    /// data unavailability.
    pub fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
        accuracy_m: Option<f64>,
    ) -> Result<LocationContext, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }

        let mut best: Option<(&StationRecord, f64)> = None;
        for station in &self.stations {
            let km = haversine_km(latitude, longitude, station.lat, station.lon);
            match best {
                Some((_, best_km)) if km >= best_km => {}
                _ => best = Some((station, km)),
            }
        }

        let context = match best {
            Some((station, km)) => {
                let code = station.code.clone().unwrap_or_default();
                let railway_context = format!(
                    "Nearest station: {} ({}). Distance: {:.2} km. Context: {}.",
                    station.name,
                    code,
                    km,
                    proximity_band(km)
                );
                LocationContext {
                    latitude,
                    longitude,
                    accuracy_m,
                    nearest_station: Some(station.name.clone()),
                    station_code: station.code.clone(),
                    station_proximity_km: Some((km * 100.0).round() / 100.0),
                    railway_context,
                    captured_at: Utc::now(),
                }
            }
            None => LocationContext {
                latitude,
                longitude,
                accuracy_m,
                nearest_station: None,
                station_code: None,
                station_proximity_km: None,
                railway_context: "Station data not available.".to_string(),
                captured_at: Utc::now(),
            },
        };

        Ok(context)
    }
}

/// Great-circle distance between two coordinates in kilometers (haversine).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlam = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlam / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Human-readable proximity band for a station distance.
fn proximity_band(km: f64) -> &'static str {
    if km < 0.5 {
        "at or very close to station premises"
    } else if km < 2.0 {
        "within station approach / platform area"
    } else if km < 10.0 {
        "within station vicinity (track segment)"
    } else {
        "en route / general area"
    }
}
