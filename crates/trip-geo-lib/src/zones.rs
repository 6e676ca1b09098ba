//! Hazard zones and the zone catalog
//!
//! Zones are owned by an external administrative collaborator. The catalog is a read-mostly
//! cache of them: every mutation bumps a revision counter, which is the invalidation signal
//! for anything derived from an earlier snapshot.

use crate::{GeoPoint, utils};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Radius applied to zones that do not specify one, in meters
pub const DEFAULT_ZONE_RADIUS_M: f64 = 1000.0;

/// Coarse search radius used to pick candidate zones around a point, in kilometers
pub const DEFAULT_ZONE_CANDIDATE_RADIUS_KM: f64 = 5.0;

#[cfg(feature = "serde")]
fn default_radius_m() -> f64 {
    DEFAULT_ZONE_RADIUS_M
}

/// Severity classification of a hazard zone
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A circular hazard region
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HazardZone {
    /// Identifier assigned by the zone owner
    pub id: String,
    pub center: GeoPoint,
    /// Radius in meters (default 1000)
    #[cfg_attr(feature = "serde", serde(default = "default_radius_m"))]
    pub radius_m: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub severity: Severity,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
}

impl HazardZone {
    /// Create a zone with the default radius and severity
    pub fn new(id: impl Into<String>, center: GeoPoint) -> Self {
        Self {
            id: id.into(),
            center,
            radius_m: DEFAULT_ZONE_RADIUS_M,
            severity: Severity::default(),
            description: String::new(),
        }
    }

    pub fn with_radius_m(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Distance from the zone center to `point`, in meters
    #[inline]
    pub fn distance_m(&self, point: GeoPoint) -> f64 {
        utils::distance_m(self.center, point)
    }

    /// Whether `point` is within the zone (boundary included)
    #[inline]
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.distance_m(point) <= self.radius_m
    }
}

/// Supplier of candidate zones for a containment query
///
/// Implementations may pre-filter to zones near `point`; the exact containment test is
/// always done afterwards, so over-inclusion is harmless but omission is not.
pub trait ZoneSource {
    fn candidate_zones(&self, point: GeoPoint, bound_km: f64) -> Vec<HazardZone>;
}

/// A plain list is taken as already filtered and returned unchanged
impl ZoneSource for [HazardZone] {
    fn candidate_zones(&self, _point: GeoPoint, _bound_km: f64) -> Vec<HazardZone> {
        self.to_vec()
    }
}

impl ZoneSource for Vec<HazardZone> {
    fn candidate_zones(&self, point: GeoPoint, bound_km: f64) -> Vec<HazardZone> {
        self.as_slice().candidate_zones(point, bound_km)
    }
}

/// Thread-safe, revisioned cache of hazard zones
///
/// Readers get an `Arc` snapshot, so a query never observes a partially applied edit.
#[derive(Debug, Default)]
pub struct ZoneCatalog {
    zones: RwLock<Arc<Vec<HazardZone>>>,
    revision: AtomicU64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ZoneCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding `zones`
    pub fn from_zones(zones: Vec<HazardZone>) -> Self {
        Self {
            zones: RwLock::new(Arc::new(zones)),
            revision: AtomicU64::new(0),
        }
    }

    /// Current zone set
    pub fn snapshot(&self) -> Arc<Vec<HazardZone>> {
        self.zones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Revision counter, incremented by every write call (`upsert`, `remove`, `replace_all`)
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Insert a zone, replacing any zone with the same id
    ///
    /// Returns the replaced zone, if any. A replaced zone keeps its position in the list so
    /// first-hit ordering stays stable across edits.
    pub fn upsert(&self, zone: HazardZone) -> Option<HazardZone> {
        let replaced = self.mutate(|zones| match zones.iter_mut().find(|z| z.id == zone.id) {
            Some(existing) => Some(std::mem::replace(existing, zone)),
            None => {
                zones.push(zone);
                None
            }
        });
        tracing::debug!("Zone catalog updated (revision {})", self.revision());
        replaced
    }

    /// Remove the zone with the given id
    pub fn remove(&self, id: &str) -> Option<HazardZone> {
        self.mutate(|zones| {
            let index = zones.iter().position(|z| z.id == id)?;
            Some(zones.remove(index))
        })
    }

    /// Replace the whole zone set
    pub fn replace_all(&self, zones: Vec<HazardZone>) {
        self.mutate(|current| *current = zones);
    }

    /// Zones whose disc may come within `bound_km` of `point`
    ///
    /// A zone is kept when its center falls inside the bounding box of a circle of
    /// `bound_km` plus the zone's own radius around `point`, so a zone larger than the bound
    /// that contains `point` is never dropped. This is a coarse filter: it may keep zones
    /// slightly farther away (box corners), never fewer.
    pub fn candidates_near(&self, point: GeoPoint, bound_km: f64) -> Vec<HazardZone> {
        self.snapshot()
            .iter()
            .filter(|zone| {
                let reach_km = bound_km.max(0.0) + zone.radius_m.max(0.0) / utils::METERS_PER_KM;
                utils::rect_contains(&utils::bounding_rect(point, reach_km), zone.center)
            })
            .cloned()
            .collect()
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<HazardZone>) -> T) -> T {
        let mut guard = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        let mut zones = guard.as_ref().clone();
        let result = f(&mut zones);
        *guard = Arc::new(zones);
        self.revision.fetch_add(1, Ordering::AcqRel);
        result
    }
}

impl ZoneSource for ZoneCatalog {
    fn candidate_zones(&self, point: GeoPoint, bound_km: f64) -> Vec<HazardZone> {
        self.candidates_near(point, bound_km)
    }
}
