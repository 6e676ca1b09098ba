use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trip_geo_lib::{
    AnnealingSchedule, CostWeights, DEFAULT_PEER_RADIUS_KM, DEFAULT_ZONE_CANDIDATE_RADIUS_KM,
    OptimizerConfig, ProximityConfig, ZoneMatchPolicy,
};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Trip Geo - route ordering and hazard/peer proximity checks for trip planning
pub struct Settings {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Reorder places into a short open path (simulated annealing)
    Optimize(OptimizeArgs),
    /// Check whether a point lies inside a hazard zone
    Zones(ZonesArgs),
    /// List tracked entities near a given entity
    Nearby(NearbyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    /// JSON file with a list of {name, latitude, longitude}
    #[clap(short, long, value_name = "FILE")]
    pub places: Option<PathBuf>,

    /// GPX files whose waypoints are added as places
    #[clap(short, long, value_name = "FILE")]
    pub gpx_files: Vec<PathBuf>,

    /// Weight of the distance term
    #[clap(long, default_value = "1.0")]
    pub distance_weight: f64,

    /// Weight of the secondary cost term (inert without a cost source)
    #[clap(long, default_value = "0.0")]
    pub cost_weight: f64,

    /// Annealing start temperature
    #[clap(long, default_value = "10000")]
    pub initial_temperature: f64,

    /// Fraction of the temperature removed each iteration
    #[clap(long, default_value = "0.003")]
    pub cooling_rate: f64,

    /// Annealing stops once the temperature is at or below this value
    #[clap(long, default_value = "1.0")]
    pub stop_temperature: f64,

    /// Seed for reproducible runs
    #[clap(long)]
    pub seed: Option<u64>,
}

impl OptimizeArgs {
    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            schedule: AnnealingSchedule {
                initial_temperature: self.initial_temperature,
                cooling_rate: self.cooling_rate,
                stop_temperature: self.stop_temperature,
            },
            weights: CostWeights {
                distance_weight: self.distance_weight,
                cost_weight: self.cost_weight,
            },
            seed: self.seed,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ZonesArgs {
    /// JSON file with a list of hazard zones
    #[clap(short, long, value_name = "FILE")]
    pub zones: PathBuf,

    /// Latitude of the point to check
    #[clap(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude of the point to check
    #[clap(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Report every containing zone instead of the first one
    #[clap(long, default_value = "false")]
    pub all: bool,

    /// Coarse pre-filter radius around the point, in kilometers
    #[clap(long, default_value_t = DEFAULT_ZONE_CANDIDATE_RADIUS_KM)]
    pub bound_km: f64,
}

impl ZonesArgs {
    pub fn proximity_config(&self) -> ProximityConfig {
        ProximityConfig {
            zone_candidate_radius_km: self.bound_km,
            zone_policy: if self.all {
                ZoneMatchPolicy::AllHits
            } else {
                ZoneMatchPolicy::FirstHit
            },
            ..ProximityConfig::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct NearbyArgs {
    /// JSON file with a list of {id, display_name, latitude, longitude}
    #[clap(short, long, value_name = "FILE")]
    pub entities: PathBuf,

    /// Id of the querying entity
    #[clap(long)]
    pub id: String,

    /// Alerting radius in kilometers
    #[clap(short, long, default_value_t = DEFAULT_PEER_RADIUS_KM)]
    pub radius_km: f64,
}
