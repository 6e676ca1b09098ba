//! Trip Geo Library - Geospatial Core for Trip Planning
//!
//! This library provides the distance, route-ordering and proximity primitives used by a
//! trip-planning backend. Everything here is in-process and free of I/O (apart from the GPX
//! loaders); persistence, transport and request handling belong to the surrounding service.
//!
//! # Architecture
//!
//! - **[`distance`]**: Haversine great-circle distance in kilometers (pure)
//! - **[`RouteOptimizer`]**: Simulated-annealing ordering of [`Place`]s into an open path
//! - **[`ProximityEngine`]**: Hazard-zone containment and peer nearness per location update
//! - **[`ZoneCatalog`]**: Revisioned hazard-zone cache with a coarse bounding-box pre-filter
//! - **[`EntityRegistry`]**: Concurrent table of live [`TrackedEntity`] positions
//!
//! # Performance Characteristics
//!
//! - **Distance**: O(1), no allocation
//! - **Optimization**: O(I × N) where I = schedule iterations (≈3066 by default), N = places
//! - **Containment**: O(Z) over the candidate zones
//! - **Peer proximity**: O(E) over the registry snapshot

mod optimizer;
mod place;
mod proximity;
mod registry;
mod zones;
pub mod utils;

// Public API exports
pub use optimizer::{
    AnnealingSchedule, CostWeights, LegCost, NoLegCost, OptimizerConfig, RouteOptimizer, Tour,
    optimize,
};
pub use place::{GeoPoint, Place, load_places_from_gpx, place_from_waypoint};
pub use proximity::{
    DEFAULT_PEER_RADIUS_KM, LocationUpdate, NearbyPeer, OperatorAlert, ProximityConfig,
    ProximityEngine, ProximityReport, ZoneHit, ZoneMatchPolicy, check_zones, check_zones_all,
    check_zones_with, nearby_entities,
};
pub use registry::{EntityRegistry, TrackedEntity};
pub use utils::{distance, distance_m};
pub use zones::{
    DEFAULT_ZONE_CANDIDATE_RADIUS_KM, DEFAULT_ZONE_RADIUS_M, HazardZone, Severity, ZoneCatalog,
    ZoneSource,
};

/// Error types for the geospatial core
///
/// Every variant except `Io` and `GpxParse` is a validation failure: it is reported to the
/// caller and never worth retrying with the same input.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("at least {required} places are required, got {actual}")]
    InsufficientInput { required: usize, actual: usize },

    #[error("invalid coordinate: ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoError {
    /// Whether this error belongs to the validation taxonomy (bad caller input)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InsufficientInput { .. } | Self::InvalidCoordinate { .. } | Self::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
