//! Command implementations
//!
//! Each command reads its input files, calls into `trip-geo-lib` and returns the result as
//! a JSON document for stdout.

use crate::app::settings::{Command, NearbyArgs, OptimizeArgs, Settings, ZonesArgs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trip_geo_lib::{
    EntityRegistry, GeoError, GeoPoint, HazardZone, NearbyPeer, Place, ProximityConfig,
    ProximityEngine, RouteOptimizer, TrackedEntity, ZoneCatalog, ZoneHit, load_places_from_gpx,
    nearby_entities,
};

/// Errors surfaced by the command-line front end
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("no places given (use --places and/or --gpx-files)")]
    NoInput,

    #[error("unknown entity: {0}")]
    UnknownEntity(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Output of `optimize`
#[derive(Debug, Serialize, Deserialize)]
pub struct OptimizeOutput {
    pub order: Vec<Place>,
    pub total_distance_km: f64,
    pub iterations: usize,
}

/// Output of `zones`
#[derive(Debug, Serialize, Deserialize)]
pub struct ZonesOutput {
    pub hit: bool,
    pub zones: Vec<ZoneHit>,
}

/// Output of `nearby`
#[derive(Debug, Serialize, Deserialize)]
pub struct NearbyOutput {
    pub id: String,
    pub nearby: Vec<NearbyPeer>,
}

/// A tracked entity as stored in the input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Run the selected command and return its JSON output
pub fn run(settings: &Settings) -> Result<String> {
    let json = match &settings.command {
        Command::Optimize(args) => serde_json::to_string_pretty(&optimize(args)?)?,
        Command::Zones(args) => serde_json::to_string_pretty(&zones(args)?)?,
        Command::Nearby(args) => serde_json::to_string_pretty(&nearby(args)?)?,
    };
    Ok(json)
}

pub fn optimize(args: &OptimizeArgs) -> Result<OptimizeOutput> {
    let mut places = match &args.places {
        Some(path) => read_json::<Vec<Place>>(path)?,
        None => Vec::new(),
    };
    for path in &args.gpx_files {
        places.extend(load_places_from_gpx(path)?);
    }
    if places.is_empty() {
        return Err(CliError::NoInput);
    }

    let config = args.optimizer_config();
    let iterations = config.schedule.iteration_count()?;
    tracing::info!(
        "Optimizing {} places ({} iterations)",
        places.len(),
        iterations
    );

    let tour = RouteOptimizer::new(config).optimize(&places)?;
    Ok(OptimizeOutput {
        order: tour.order,
        total_distance_km: tour.total_distance_km,
        iterations,
    })
}

pub fn zones(args: &ZonesArgs) -> Result<ZonesOutput> {
    let config = args.proximity_config();
    config.validate()?;
    let point = GeoPoint::try_new(args.lat, args.lon)?;
    let zones = read_json::<Vec<HazardZone>>(&args.zones)?;
    let catalog = ZoneCatalog::from_zones(zones);

    let engine = ProximityEngine::new(config);
    let hits = engine.check_point(point, &catalog);
    Ok(ZonesOutput {
        hit: !hits.is_empty(),
        zones: hits,
    })
}

pub fn nearby(args: &NearbyArgs) -> Result<NearbyOutput> {
    ProximityConfig {
        peer_radius_km: args.radius_km,
        ..ProximityConfig::default()
    }
    .validate()?;
    let records = read_json::<Vec<EntityRecord>>(&args.entities)?;
    let registry = EntityRegistry::new();
    for record in records {
        let location = GeoPoint::try_new(record.latitude, record.longitude)?;
        registry.upsert(TrackedEntity::new(record.id, record.display_name, location));
    }

    let me = registry
        .get(&args.id)
        .ok_or_else(|| CliError::UnknownEntity(args.id.clone()))?;
    let nearby = nearby_entities(&me, &registry.snapshot(), args.radius_km);
    Ok(NearbyOutput {
        id: me.id,
        nearby,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}
