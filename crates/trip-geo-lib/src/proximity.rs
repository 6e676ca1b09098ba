//! Proximity engine: hazard-zone containment and peer nearness
//!
//! Both queries are stateless and built on [`crate::distance`]. The live entity table and
//! the zone set are passed in by the caller on every call.

use crate::{
    EntityRegistry, GeoError, GeoPoint, HazardZone, Result, Severity, TrackedEntity, ZoneSource,
    utils, zones::DEFAULT_ZONE_CANDIDATE_RADIUS_KM,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default alerting radius between two tracked entities, in kilometers
pub const DEFAULT_PEER_RADIUS_KM: f64 = 2.0;

/// How many zones a containment query reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ZoneMatchPolicy {
    /// Stop at the first matching zone in caller order
    #[default]
    FirstHit,
    /// Report every matching zone in caller order
    AllHits,
}

/// A zone that contains the queried point
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoneHit {
    pub zone: HazardZone,
    /// Distance from the zone center to the point, in meters
    pub distance_m: f64,
}

/// A nearby entity, reduced to what may be shared with other users
///
/// Coordinates are deliberately absent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NearbyPeer {
    pub id: String,
    pub display_name: String,
}

#[inline]
fn zone_hit(zone: &HazardZone, point: GeoPoint) -> Option<ZoneHit> {
    let distance_m = utils::distance_m(zone.center, point);
    (distance_m <= zone.radius_m).then(|| ZoneHit {
        zone: zone.clone(),
        distance_m,
    })
}

/// First zone (in the given order) containing `point`, or `None`
///
/// A point inside several overlapping zones reports only the first of them; use
/// [`check_zones_all`] when every overlap matters.
pub fn check_zones(point: GeoPoint, zones: &[HazardZone]) -> Option<ZoneHit> {
    zones.iter().find_map(|zone| zone_hit(zone, point))
}

/// Every zone containing `point`, in the given order
pub fn check_zones_all(point: GeoPoint, zones: &[HazardZone]) -> Vec<ZoneHit> {
    zones.iter().filter_map(|zone| zone_hit(zone, point)).collect()
}

/// Containment query with an explicit policy
pub fn check_zones_with(
    point: GeoPoint,
    zones: &[HazardZone],
    policy: ZoneMatchPolicy,
) -> Vec<ZoneHit> {
    match policy {
        ZoneMatchPolicy::FirstHit => check_zones(point, zones).into_iter().collect(),
        ZoneMatchPolicy::AllHits => check_zones_all(point, zones),
    }
}

/// Entities within `radius_km` of `me`, excluding `me` itself (matched by id)
///
/// The order of the result is unspecified.
pub fn nearby_entities(
    me: &TrackedEntity,
    others: &[TrackedEntity],
    radius_km: f64,
) -> Vec<NearbyPeer> {
    others
        .iter()
        .filter(|other| other.id != me.id)
        .filter(|other| utils::distance(me.location, other.location) <= radius_km)
        .map(|other| NearbyPeer {
            id: other.id.clone(),
            display_name: other.display_name.clone(),
        })
        .collect()
}

/// Proximity engine settings
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProximityConfig {
    /// Alerting radius between two entities, in kilometers (default 2)
    pub peer_radius_km: f64,
    /// Coarse radius used to fetch candidate zones, in kilometers (default 5)
    pub zone_candidate_radius_km: f64,
    /// Containment policy for location updates (default first hit)
    pub zone_policy: ZoneMatchPolicy,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            peer_radius_km: DEFAULT_PEER_RADIUS_KM,
            zone_candidate_radius_km: DEFAULT_ZONE_CANDIDATE_RADIUS_KM,
            zone_policy: ZoneMatchPolicy::FirstHit,
        }
    }
}

impl ProximityConfig {
    /// Both radii must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("peer radius", self.peer_radius_km),
            ("zone candidate radius", self.zone_candidate_radius_km),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(GeoError::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A position reported by a live connection
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationUpdate {
    pub entity_id: String,
    pub display_name: String,
    pub location: GeoPoint,
}

/// Message for the operators channel when an entity enters a hazard zone
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperatorAlert {
    pub entity_id: String,
    pub display_name: String,
    pub location: GeoPoint,
    pub zone_id: String,
    pub severity: Severity,
    pub distance_m: f64,
}

/// Result of processing one location update
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProximityReport {
    pub entity: TrackedEntity,
    pub zone_hits: Vec<ZoneHit>,
    pub nearby: Vec<NearbyPeer>,
}

impl ProximityReport {
    /// Whether the entity is inside at least one hazard zone
    #[inline]
    pub fn in_hazard_zone(&self) -> bool {
        !self.zone_hits.is_empty()
    }

    /// One alert per zone hit, for the operators channel
    pub fn operator_alerts(&self) -> Vec<OperatorAlert> {
        self.zone_hits
            .iter()
            .map(|hit| OperatorAlert {
                entity_id: self.entity.id.clone(),
                display_name: self.entity.display_name.clone(),
                location: self.entity.location,
                zone_id: hit.zone.id.clone(),
                severity: hit.zone.severity,
                distance_m: hit.distance_m,
            })
            .collect()
    }
}

/// Runs both proximity queries for every location update
#[derive(Debug, Clone, Default)]
pub struct ProximityEngine {
    config: ProximityConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ProximityEngine {
    pub fn new(config: ProximityConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    /// Zone containment for a point, using the configured candidate radius and policy
    pub fn check_point<Z: ZoneSource + ?Sized>(&self, point: GeoPoint, zones: &Z) -> Vec<ZoneHit> {
        let candidates = zones.candidate_zones(point, self.config.zone_candidate_radius_km);
        check_zones_with(point, &candidates, self.config.zone_policy)
    }

    /// Record a location update and evaluate it
    ///
    /// The entity is upserted into `registry` first, then checked against the candidate
    /// zones from `zones` and against every other entity in the registry.
    pub fn handle_location_update<Z: ZoneSource + ?Sized>(
        &self,
        registry: &EntityRegistry,
        zones: &Z,
        update: LocationUpdate,
    ) -> Result<ProximityReport> {
        #[cfg(feature = "profiling")]
        profiling::scope!("proximity::handle_location_update");

        self.config.validate()?;
        if let Err(err) = update.location.validate() {
            tracing::warn!("Rejected location update from {}: {err}", update.entity_id);
            return Err(err);
        }

        let entity = registry.update_location(
            &update.entity_id,
            &update.display_name,
            update.location,
        );

        let zone_hits = self.check_point(entity.location, zones);
        for hit in &zone_hits {
            tracing::info!(
                "Entity {} entered hazard zone {} ({:?}, {:.0} m from center)",
                entity.id,
                hit.zone.id,
                hit.zone.severity,
                hit.distance_m
            );
        }

        let snapshot = registry.snapshot();
        let nearby = nearby_entities(&entity, &snapshot, self.config.peer_radius_km);
        tracing::debug!(
            "Location update from {}: {} zone hit(s), {} nearby of {} tracked",
            entity.id,
            zone_hits.len(),
            nearby.len(),
            snapshot.len()
        );

        Ok(ProximityReport {
            entity,
            zone_hits,
            nearby,
        })
    }
}
