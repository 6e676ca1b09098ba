//! Coordinate and place types
//!
//! This module provides the `GeoPoint` value type, the `Place` visited by the optimizer,
//! and helpers to read places from GPX waypoints.

use crate::utils::{MAX_LAT, MAX_LON};
use crate::{GeoError, Result, utils};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees
///
/// Plain value type with no identity beyond its coordinates. `new` does not validate;
/// use `try_new` or `validate` at trust boundaries.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    #[cfg_attr(feature = "serde", serde(rename = "latitude"))]
    lat: f64,
    #[cfg_attr(feature = "serde", serde(rename = "longitude"))]
    lon: f64,
}

impl GeoPoint {
    /// Create a point without validating the coordinates
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Create a point, rejecting non-finite or out-of-range coordinates
    pub fn try_new(lat: f64, lon: f64) -> Result<Self> {
        let point = Self::new(lat, lon);
        point.validate()?;
        Ok(point)
    }

    /// Latitude in degrees
    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees
    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Check that latitude is within [-90, 90] and longitude within [-180, 180]
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-MAX_LAT..=MAX_LAT).contains(&self.lat)
            && (-MAX_LON..=MAX_LON).contains(&self.lon)
    }

    /// Same check as `is_valid`, as an error
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(GeoError::InvalidCoordinate {
                latitude: self.lat,
                longitude: self.lon,
            })
        }
    }

    /// Great-circle distance to another point in kilometers
    #[inline]
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        utils::distance(*self, *other)
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(point: GeoPoint) -> Self {
        geo::Point::new(point.lon, point.lat)
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(point: geo::Point<f64>) -> Self {
        GeoPoint::new(point.y(), point.x())
    }
}

/// A named stop on a trip
///
/// The name is carried through the optimizer untouched; only the location is inspected.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Place {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub location: GeoPoint,
}

impl Place {
    pub fn new(name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

/// Build a place from a GPX waypoint, naming it `fallback_name` when the waypoint has no name
pub fn place_from_waypoint(waypoint: &gpx::Waypoint, fallback_name: &str) -> Place {
    let name = waypoint
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| fallback_name.to_string());
    Place::new(name, GeoPoint::from(waypoint.point()))
}

/// Read the waypoints of a GPX file as places
///
/// Waypoints without a name are called `waypoint-N` (N = position in the file, from 1).
/// Waypoints with coordinates outside the WGS84 range are skipped with a warning.
pub fn load_places_from_gpx<P: AsRef<Path>>(path: P) -> Result<Vec<Place>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("place::load_places_from_gpx");

    let file = std::fs::File::open(path.as_ref())?;
    let reader = std::io::BufReader::new(file);
    let gpx_data = gpx::read(reader)?;

    let places = gpx_data
        .waypoints
        .iter()
        .enumerate()
        .filter_map(|(i, waypoint)| {
            let place = place_from_waypoint(waypoint, &format!("waypoint-{}", i + 1));
            if place.location.is_valid() {
                Some(place)
            } else {
                tracing::warn!(
                    "Skipping waypoint with invalid coordinates: ({}, {})",
                    place.location.lat(),
                    place.location.lon()
                );
                None
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Loaded {} places from {}",
        places.len(),
        path.as_ref().display()
    );
    Ok(places)
}
