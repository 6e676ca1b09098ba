//! Distance function and spatial helpers shared by the optimizer and the proximity engine

use crate::GeoPoint;
use geo::{Coord, Rect};

/// Mean Earth radius used by the spherical approximation, in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Latitude bounds in degrees
pub const MAX_LAT: f64 = 90.0;

/// Longitude bounds in degrees
pub const MAX_LON: f64 = 180.0;

/// Meters per kilometer
pub const METERS_PER_KM: f64 = 1000.0;

/// Great-circle distance between two points in kilometers (Haversine formula)
///
/// Both points must be valid WGS84 coordinates; this layer does not validate them.
/// The result is symmetric, non-negative and exactly `0.0` for identical points.
///
/// # Arguments
/// * `a` - First point
/// * `b` - Second point
///
/// # Returns
/// Distance along the surface of a 6371 km sphere, in kilometers
#[inline(always)]
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let delta_lat = (b.lat() - a.lat()).to_radians();
    let delta_lon = (b.lon() - a.lon()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    EARTH_RADIUS_KM * c
}

/// Great-circle distance in meters
#[inline(always)]
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    distance(a, b) * METERS_PER_KM
}

/// Conservative bounding box (in degrees, x = longitude, y = latitude) around `center`
///
/// Every point within `radius_km` of `center` lies inside the returned rectangle. When the
/// circle reaches a pole or crosses the antimeridian the longitude span widens to the full
/// [-180, 180] range, so the box is only ever too large, never too small.
pub fn bounding_rect(center: GeoPoint, radius_km: f64) -> Rect<f64> {
    let angular = radius_km.max(0.0) / EARTH_RADIUS_KM;
    let delta_lat = angular.to_degrees();

    let min_lat = center.lat() - delta_lat;
    let max_lat = center.lat() + delta_lat;

    let (min_lat, max_lat, min_lon, max_lon) = if min_lat > -MAX_LAT && max_lat < MAX_LAT {
        let delta_lon = (angular.sin() / center.lat().to_radians().cos())
            .min(1.0)
            .asin()
            .to_degrees();
        let (min_lon, max_lon) = (center.lon() - delta_lon, center.lon() + delta_lon);
        if min_lon < -MAX_LON || max_lon > MAX_LON {
            (min_lat, max_lat, -MAX_LON, MAX_LON)
        } else {
            (min_lat, max_lat, min_lon, max_lon)
        }
    } else {
        (min_lat.max(-MAX_LAT), max_lat.min(MAX_LAT), -MAX_LON, MAX_LON)
    };

    Rect::new(
        Coord {
            x: min_lon,
            y: min_lat,
        },
        Coord {
            x: max_lon,
            y: max_lat,
        },
    )
}

/// Check whether a point lies inside (or on the edge of) a degree-space rectangle
#[inline(always)]
pub fn rect_contains(rect: &Rect<f64>, point: GeoPoint) -> bool {
    let min = rect.min();
    let max = rect.max();
    point.lon() >= min.x && point.lon() <= max.x && point.lat() >= min.y && point.lat() <= max.y
}
