//! Live table of tracked entities
//!
//! Keyed by connection/session id. Entries are inserted on connect or location update and
//! removed on disconnect. The map is sharded, so concurrent producers only contend when they
//! hit the same shard, and every entry is replaced as a whole under its shard lock.

use crate::GeoPoint;
use dashmap::DashMap;
use std::time::{Duration, SystemTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A tracked entity's latest known position
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackedEntity {
    pub id: String,
    pub location: GeoPoint,
    pub display_name: String,
    pub updated_at: SystemTime,
}

impl TrackedEntity {
    /// Create an entity stamped with the current time
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: id.into(),
            location,
            display_name: display_name.into(),
            updated_at: SystemTime::now(),
        }
    }

    /// Age of the last update relative to `now` (zero if the clock went backwards)
    #[inline]
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.updated_at).unwrap_or_default()
    }
}

/// Concurrent registry of tracked entities
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: DashMap<String, TrackedEntity>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity, returning the previous entry
    pub fn upsert(&self, entity: TrackedEntity) -> Option<TrackedEntity> {
        self.entities.insert(entity.id.clone(), entity)
    }

    /// Record a new position for `id`, stamped with the current time
    pub fn update_location(
        &self,
        id: &str,
        display_name: &str,
        location: GeoPoint,
    ) -> TrackedEntity {
        let entity = TrackedEntity::new(id, display_name, location);
        self.upsert(entity.clone());
        entity
    }

    /// Remove an entity (disconnect)
    pub fn remove(&self, id: &str) -> Option<TrackedEntity> {
        self.entities.remove(id).map(|(_, entity)| entity)
    }

    /// Copy of a single entity
    pub fn get(&self, id: &str) -> Option<TrackedEntity> {
        self.entities.get(id).map(|entry| entry.value().clone())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Copy of every entity
    ///
    /// Each entry is read under its shard lock, so no entry is ever half-written. The
    /// snapshot as a whole is not a global point-in-time view: entries updated while the
    /// snapshot is taken may appear in their old or new state.
    pub fn snapshot(&self) -> Vec<TrackedEntity> {
        self.entities
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drop entities whose last update is older than `max_age`
    ///
    /// Returns the number of entities removed.
    pub fn evict_stale(&self, max_age: Duration, now: SystemTime) -> usize {
        let before = self.entities.len();
        self.entities.retain(|_, entity| entity.age(now) <= max_age);
        let evicted = before.saturating_sub(self.entities.len());
        if evicted > 0 {
            tracing::debug!("Evicted {evicted} stale tracked entities");
        }
        evicted
    }
}
