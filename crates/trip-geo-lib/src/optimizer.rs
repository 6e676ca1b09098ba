//! Route optimizer - simulated annealing over visiting orders
//!
//! Produces an open path (no return to the start) through every place exactly once,
//! approximately minimizing the total great-circle distance.
//!
//! # Algorithm
//!
//! 1. Start from the input order.
//! 2. Each iteration swaps two uniformly drawn positions of the current order.
//! 3. Better neighbors are always accepted; worse ones with probability
//!    `exp((current - neighbor) / temperature)`.
//! 4. The temperature is multiplied by `1 - cooling_rate` after every iteration until it
//!    drops to `stop_temperature`.
//! 5. The best order seen at any point is returned, not the final state.
//!
//! The iteration count depends only on the schedule, never on the number of places.

use crate::{GeoError, Place, Result, utils};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum number of places the optimizer accepts
const MIN_PLACES: usize = 2;

/// Cooling schedule for the annealing loop
///
/// The defaults (10000 → 1, 0.3% per step) give 3066 iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnnealingSchedule {
    /// Starting temperature (default 10000)
    pub initial_temperature: f64,
    /// Fraction removed from the temperature each iteration (default 0.003)
    pub cooling_rate: f64,
    /// The loop runs while the temperature is above this value (default 1)
    pub stop_temperature: f64,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self {
            initial_temperature: 10_000.0,
            cooling_rate: 0.003,
            stop_temperature: 1.0,
        }
    }
}

impl AnnealingSchedule {
    /// Reject schedules that would not terminate or make no sense
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
            return Err(GeoError::InvalidConfig(format!(
                "initial temperature must be positive, got {}",
                self.initial_temperature
            )));
        }
        if !(self.stop_temperature.is_finite() && self.stop_temperature > 0.0) {
            return Err(GeoError::InvalidConfig(format!(
                "stop temperature must be positive, got {}",
                self.stop_temperature
            )));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(GeoError::InvalidConfig(format!(
                "cooling rate must be in (0, 1), got {}",
                self.cooling_rate
            )));
        }
        Ok(())
    }

    /// Number of iterations the loop performs under this schedule
    ///
    /// Fails like `validate` for schedules that would never reach the stop temperature.
    pub fn iteration_count(&self) -> Result<usize> {
        self.validate()?;
        let factor = 1.0 - self.cooling_rate;
        let mut temperature = self.initial_temperature;
        let mut iterations = 0;
        while temperature > self.stop_temperature {
            temperature *= factor;
            iterations += 1;
        }
        Ok(iterations)
    }
}

/// Weights of the two energy terms
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CostWeights {
    /// Multiplier of the leg distance in kilometers (default 1)
    pub distance_weight: f64,
    /// Multiplier of the secondary per-leg cost from [`LegCost`] (default 0)
    pub cost_weight: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            distance_weight: 1.0,
            cost_weight: 0.0,
        }
    }
}

impl CostWeights {
    pub fn validate(&self) -> Result<()> {
        if !(self.distance_weight.is_finite() && self.distance_weight > 0.0) {
            return Err(GeoError::InvalidConfig(format!(
                "distance weight must be positive, got {}",
                self.distance_weight
            )));
        }
        if !(self.cost_weight.is_finite() && self.cost_weight >= 0.0) {
            return Err(GeoError::InvalidConfig(format!(
                "cost weight must be non-negative, got {}",
                self.cost_weight
            )));
        }
        Ok(())
    }
}

/// Secondary cost of travelling one leg (e.g. fare or toll)
///
/// Must be symmetric in practice; the optimizer only ever evaluates legs in path order.
pub trait LegCost: Sync {
    fn leg_cost(&self, from: &Place, to: &Place) -> f64;
}

/// No secondary cost: the cost term contributes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLegCost;

impl LegCost for NoLegCost {
    #[inline(always)]
    fn leg_cost(&self, _from: &Place, _to: &Place) -> f64 {
        0.0
    }
}

impl<F> LegCost for F
where
    F: Fn(&Place, &Place) -> f64 + Sync,
{
    #[inline]
    fn leg_cost(&self, from: &Place, to: &Place) -> f64 {
        self(from, to)
    }
}

/// Optimizer configuration
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizerConfig {
    pub schedule: AnnealingSchedule,
    pub weights: CostWeights,
    /// Fixed seed for the random source; `None` draws from OS entropy per run
    pub seed: Option<u64>,
}

/// An optimized visiting order
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tour {
    /// The input places, reordered
    pub order: Vec<Place>,
    /// Energy of the order divided by the distance weight
    ///
    /// This is the plain path length in kilometers while the cost term is inert. With an
    /// active [`LegCost`] it also carries the weighted secondary cost, in kilometer units.
    pub total_distance_km: f64,
    /// Weighted energy of the order (distance and secondary cost terms)
    pub energy: f64,
}

/// Simulated-annealing route optimizer
#[derive(Debug, Clone)]
pub struct RouteOptimizer<C = NoLegCost> {
    config: OptimizerConfig,
    leg_cost: C,
}

impl RouteOptimizer<NoLegCost> {
    /// Create an optimizer with no secondary cost
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            leg_cost: NoLegCost,
        }
    }
}

impl Default for RouteOptimizer<NoLegCost> {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<C: LegCost> RouteOptimizer<C> {
    /// Wire in a secondary per-leg cost, weighted by `weights.cost_weight`
    pub fn with_leg_cost<D: LegCost>(self, leg_cost: D) -> RouteOptimizer<D> {
        RouteOptimizer {
            config: self.config,
            leg_cost,
        }
    }

    #[inline]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize with the configured seed, or OS entropy when none is set
    pub fn optimize(&self, places: &[Place]) -> Result<Tour> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.optimize_with_rng(places, &mut rng)
    }

    /// Optimize drawing randomness from `rng`
    pub fn optimize_with_rng<R: Rng>(&self, places: &[Place], rng: &mut R) -> Result<Tour> {
        self.optimize_until(places, rng, &AtomicBool::new(false))
    }

    /// Optimize, stopping early once `cancel` is set
    ///
    /// The flag is checked between iterations; on cancellation the best order found so far
    /// is returned.
    pub fn optimize_until<R: Rng>(
        &self,
        places: &[Place],
        rng: &mut R,
        cancel: &AtomicBool,
    ) -> Result<Tour> {
        #[cfg(feature = "profiling")]
        profiling::scope!("optimizer::optimize_until");

        self.validate(places)?;

        let n = places.len();
        if n == MIN_PLACES {
            let order: Vec<usize> = (0..n).collect();
            return Ok(self.tour(places, &order, self.energy(places, &order)));
        }

        let schedule = &self.config.schedule;
        let factor = 1.0 - schedule.cooling_rate;

        let mut current: Vec<usize> = (0..n).collect();
        let mut current_energy = self.energy(places, &current);
        let mut candidate = current.clone();
        let mut best = current.clone();
        let mut best_energy = current_energy;
        let initial_energy = current_energy;

        tracing::debug!(
            "Optimizing {} places ({} iterations, initial energy {:.3})",
            n,
            schedule.iteration_count()?,
            initial_energy
        );

        let mut temperature = schedule.initial_temperature;
        let mut iterations = 0usize;
        while temperature > schedule.stop_temperature {
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!("Optimization cancelled after {iterations} iterations");
                break;
            }

            candidate.copy_from_slice(&current);
            let i = rng.random_range(0..n);
            let j = rng.random_range(0..n);
            candidate.swap(i, j);
            let candidate_energy = self.energy(places, &candidate);

            if accept(current_energy, candidate_energy, temperature, rng) {
                std::mem::swap(&mut current, &mut candidate);
                current_energy = candidate_energy;
                if current_energy < best_energy {
                    best.copy_from_slice(&current);
                    best_energy = current_energy;
                }
            }

            temperature *= factor;
            iterations += 1;
        }

        tracing::debug!(
            "Optimization finished: energy {:.3} -> {:.3} after {} iterations",
            initial_energy,
            best_energy,
            iterations
        );

        Ok(self.tour(places, &best, best_energy))
    }

    /// Optimize several independent requests in parallel
    ///
    /// Each request gets its own random source (seeded from the configured seed plus the
    /// request index when a seed is set).
    pub fn optimize_batch(&self, requests: &[Vec<Place>]) -> Vec<Result<Tour>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("optimizer::optimize_batch");

        requests
            .par_iter()
            .enumerate()
            .map(|(i, places)| {
                let mut rng = match self.config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                    None => StdRng::from_os_rng(),
                };
                self.optimize_with_rng(places, &mut rng)
            })
            .collect()
    }

    /// Weighted energy of an order over the open path
    pub fn energy(&self, places: &[Place], order: &[usize]) -> f64 {
        let weights = &self.config.weights;
        order
            .windows(2)
            .map(|leg| {
                let (from, to) = (&places[leg[0]], &places[leg[1]]);
                let mut cost =
                    weights.distance_weight * utils::distance(from.location, to.location);
                if weights.cost_weight != 0.0 {
                    cost += weights.cost_weight * self.leg_cost.leg_cost(from, to);
                }
                cost
            })
            .sum()
    }

    fn validate(&self, places: &[Place]) -> Result<()> {
        self.config.schedule.validate()?;
        self.config.weights.validate()?;
        if places.len() < MIN_PLACES {
            return Err(GeoError::InsufficientInput {
                required: MIN_PLACES,
                actual: places.len(),
            });
        }
        places
            .iter()
            .try_for_each(|place| place.location.validate())
    }

    fn tour(&self, places: &[Place], order: &[usize], energy: f64) -> Tour {
        Tour {
            order: order.iter().map(|&i| places[i].clone()).collect(),
            total_distance_km: energy / self.config.weights.distance_weight,
            energy,
        }
    }
}

/// Metropolis acceptance rule
#[inline]
fn accept<R: Rng>(current: f64, candidate: f64, temperature: f64, rng: &mut R) -> bool {
    if candidate < current {
        return true;
    }
    rng.random::<f64>() < ((current - candidate) / temperature).exp()
}

/// Optimize with the default schedule and the given weights
pub fn optimize(places: &[Place], weights: CostWeights) -> Result<Tour> {
    RouteOptimizer::new(OptimizerConfig {
        weights,
        ..OptimizerConfig::default()
    })
    .optimize(places)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoPoint;

    fn place(name: &str, lat: f64, lon: f64) -> Place {
        Place::new(name, GeoPoint::new(lat, lon))
    }

    fn path_length(places: &[Place], order: &[usize]) -> f64 {
        order
            .windows(2)
            .map(|leg| utils::distance(places[leg[0]].location, places[leg[1]].location))
            .sum()
    }

    fn names(tour: &Tour) -> Vec<&str> {
        tour.order.iter().map(|p| p.name.as_str()).collect()
    }

    fn seeded(seed: u64) -> RouteOptimizer {
        RouteOptimizer::new(OptimizerConfig {
            seed: Some(seed),
            ..OptimizerConfig::default()
        })
    }

    fn sorted_names(places: &[Place]) -> Vec<String> {
        let mut names: Vec<String> = places.iter().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }

    fn scattered_places(count: usize, seed: u64) -> Vec<Place> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|i| {
                place(
                    &format!("p{i}"),
                    17.0 + rng.random::<f64>() * 0.5,
                    78.0 + rng.random::<f64>() * 0.5,
                )
            })
            .collect()
    }

    #[test]
    fn test_schedule_defaults() {
        let schedule = AnnealingSchedule::default();
        assert_eq!(schedule.initial_temperature, 10_000.0);
        assert_eq!(schedule.cooling_rate, 0.003);
        assert_eq!(schedule.stop_temperature, 1.0);
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn test_iteration_count_is_fixed() {
        let schedule = AnnealingSchedule::default();
        let expected = (10_000.0_f64.ln() / -(1.0_f64 - 0.003).ln()).ceil() as usize;
        let count = schedule.iteration_count().unwrap();
        assert!(count.abs_diff(expected) <= 1, "{count} vs {expected}");

        let fast = AnnealingSchedule {
            initial_temperature: 100.0,
            cooling_rate: 0.5,
            stop_temperature: 1.0,
        };
        // 100, 50, 25, 12.5, 6.25, 3.125, 1.5625 -> 0.78
        assert_eq!(fast.iteration_count().unwrap(), 7);
    }

    #[test]
    fn test_iteration_count_rejects_non_terminating_schedules() {
        for schedule in [
            AnnealingSchedule {
                cooling_rate: 0.0,
                ..AnnealingSchedule::default()
            },
            AnnealingSchedule {
                stop_temperature: -1.0,
                ..AnnealingSchedule::default()
            },
            AnnealingSchedule {
                initial_temperature: f64::INFINITY,
                ..AnnealingSchedule::default()
            },
        ] {
            let err = schedule.iteration_count().unwrap_err();
            assert!(matches!(err, GeoError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        for schedule in [
            AnnealingSchedule {
                cooling_rate: 0.0,
                ..AnnealingSchedule::default()
            },
            AnnealingSchedule {
                cooling_rate: 1.0,
                ..AnnealingSchedule::default()
            },
            AnnealingSchedule {
                stop_temperature: 0.0,
                ..AnnealingSchedule::default()
            },
            AnnealingSchedule {
                initial_temperature: f64::NAN,
                ..AnnealingSchedule::default()
            },
        ] {
            let optimizer = RouteOptimizer::new(OptimizerConfig {
                schedule,
                ..OptimizerConfig::default()
            });
            let places = vec![place("a", 0.0, 0.0), place("b", 0.0, 1.0)];
            let err = optimizer.optimize(&places).unwrap_err();
            assert!(matches!(err, GeoError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let places = vec![place("a", 0.0, 0.0), place("b", 0.0, 1.0)];
        for weights in [
            CostWeights {
                distance_weight: 0.0,
                cost_weight: 0.0,
            },
            CostWeights {
                distance_weight: 1.0,
                cost_weight: -1.0,
            },
        ] {
            let err = optimize(&places, weights).unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_insufficient_input() {
        let err = optimize(&[], CostWeights::default()).unwrap_err();
        assert!(matches!(
            err,
            GeoError::InsufficientInput {
                required: 2,
                actual: 0
            }
        ));

        let err = optimize(&[place("a", 0.0, 0.0)], CostWeights::default()).unwrap_err();
        assert!(matches!(err, GeoError::InsufficientInput { actual: 1, .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let places = vec![place("a", 0.0, 0.0), place("b", 95.0, 0.0)];
        let err = optimize(&places, CostWeights::default()).unwrap_err();
        assert!(matches!(err, GeoError::InvalidCoordinate { .. }));
    }

    #[test]
    fn test_two_places_direct() {
        let places = vec![place("a", 0.0, 0.0), place("b", 0.0, 1.0)];
        let tour = optimize(&places, CostWeights::default()).unwrap();
        assert_eq!(names(&tour), vec!["a", "b"]);
        let direct = utils::distance(places[0].location, places[1].location);
        assert!((tour.total_distance_km - direct).abs() < 1e-12);
    }

    #[test]
    fn test_collinear_places() {
        // A(0,0) B(0,1) C(0,2), given in the bad order A, C, B
        let places = vec![
            place("A", 0.0, 0.0),
            place("C", 0.0, 2.0),
            place("B", 0.0, 1.0),
        ];
        for seed in 0..5 {
            let tour = seeded(seed).optimize(&places).unwrap();
            let order = names(&tour);
            assert!(
                order == vec!["A", "B", "C"] || order == vec!["C", "B", "A"],
                "unexpected order {order:?}"
            );
            assert!((tour.total_distance_km - 222.39).abs() < 0.1);
        }
    }

    #[test]
    fn test_output_is_permutation() {
        let mut places = scattered_places(12, 7);
        // Duplicate entry to check multiset preservation
        places.push(places[3].clone());

        let tour = seeded(42).optimize(&places).unwrap();
        assert_eq!(tour.order.len(), places.len());
        assert_eq!(sorted_names(&tour.order), sorted_names(&places));
    }

    #[test]
    fn test_never_worse_than_identity() {
        let optimizer = seeded(3);
        for seed in 0..10 {
            let places = scattered_places(8, seed);
            let identity: Vec<usize> = (0..places.len()).collect();
            let identity_length = path_length(&places, &identity);

            let tour = optimizer.optimize(&places).unwrap();
            assert!(tour.total_distance_km <= identity_length + 1e-9);
        }
    }

    #[test]
    fn test_already_optimal_input_is_kept_optimal() {
        let places: Vec<Place> = (0..6)
            .map(|i| place(&format!("p{i}"), 0.0, i as f64 * 0.1))
            .collect();
        let identity: Vec<usize> = (0..places.len()).collect();
        let tour = seeded(11).optimize(&places).unwrap();
        assert!((tour.total_distance_km - path_length(&places, &identity)).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let places = scattered_places(10, 1);
        let a = seeded(99).optimize(&places).unwrap();
        let b = seeded(99).optimize(&places).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_injected_rng() {
        let places = scattered_places(6, 2);
        let optimizer = RouteOptimizer::default();
        let mut rng_a = StdRng::seed_from_u64(5);
        let mut rng_b = StdRng::seed_from_u64(5);
        assert_eq!(
            optimizer.optimize_with_rng(&places, &mut rng_a).unwrap(),
            optimizer.optimize_with_rng(&places, &mut rng_b).unwrap()
        );
    }

    #[test]
    fn test_cancelled_run_returns_identity_order() {
        let places = scattered_places(8, 4);
        let cancel = AtomicBool::new(true);
        let mut rng = StdRng::seed_from_u64(0);
        let tour = RouteOptimizer::default()
            .optimize_until(&places, &mut rng, &cancel)
            .unwrap();
        assert_eq!(tour.order, places);
    }

    #[test]
    fn test_accelerated_schedule() {
        let optimizer = RouteOptimizer::new(OptimizerConfig {
            schedule: AnnealingSchedule {
                initial_temperature: 10.0,
                cooling_rate: 0.1,
                stop_temperature: 1.0,
            },
            seed: Some(8),
            ..OptimizerConfig::default()
        });
        let places = scattered_places(5, 9);
        let tour = optimizer.optimize(&places).unwrap();
        assert_eq!(tour.order.len(), 5);
    }

    #[test]
    fn test_energy_scales_with_distance_weight() {
        let places = vec![
            place("a", 0.0, 0.0),
            place("b", 0.0, 1.0),
            place("c", 0.0, 2.0),
        ];
        let order = [0, 1, 2];
        let unit = RouteOptimizer::default().energy(&places, &order);
        let doubled = RouteOptimizer::new(OptimizerConfig {
            weights: CostWeights {
                distance_weight: 2.0,
                cost_weight: 0.0,
            },
            ..OptimizerConfig::default()
        })
        .energy(&places, &order);
        assert!((doubled - 2.0 * unit).abs() < 1e-9);

        // The reported distance stays in kilometers
        let tour = RouteOptimizer::new(OptimizerConfig {
            weights: CostWeights {
                distance_weight: 2.0,
                cost_weight: 0.0,
            },
            seed: Some(1),
            ..OptimizerConfig::default()
        })
        .optimize(&places)
        .unwrap();
        assert!((tour.total_distance_km - tour.energy / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_term_inert_by_default() {
        let places = scattered_places(5, 6);
        let order: Vec<usize> = (0..5).collect();
        let with_weight_only = RouteOptimizer::new(OptimizerConfig {
            weights: CostWeights {
                distance_weight: 1.0,
                cost_weight: 10.0,
            },
            ..OptimizerConfig::default()
        });
        assert!(
            (with_weight_only.energy(&places, &order) - path_length(&places, &order)).abs() < 1e-9
        );
    }

    #[test]
    fn test_leg_cost_extension_point() {
        let places = vec![
            place("a", 0.0, 0.0),
            place("b", 0.0, 1.0),
            place("c", 0.0, 2.0),
        ];
        let optimizer = RouteOptimizer::new(OptimizerConfig {
            weights: CostWeights {
                distance_weight: 1.0,
                cost_weight: 1.0,
            },
            ..OptimizerConfig::default()
        })
        .with_leg_cost(|_: &Place, _: &Place| 100.0);

        let energy = optimizer.energy(&places, &[0, 1, 2]);
        let distance = path_length(&places, &[0, 1, 2]);
        assert!((energy - (distance + 200.0)).abs() < 1e-9);
    }

    #[test]
    fn test_reported_distance_is_normalized_energy() {
        let places = vec![
            place("a", 0.0, 0.0),
            place("c", 0.0, 2.0),
            place("b", 0.0, 1.0),
        ];
        let identity = [0, 1, 2];
        let optimizer = RouteOptimizer::new(OptimizerConfig {
            weights: CostWeights {
                distance_weight: 2.0,
                cost_weight: 1.0,
            },
            seed: Some(4),
            ..OptimizerConfig::default()
        })
        .with_leg_cost(|from: &Place, _to: &Place| if from.name == "a" { 500.0 } else { 1.0 });

        let tour = optimizer.optimize(&places).unwrap();
        assert!((tour.total_distance_km - tour.energy / 2.0).abs() < 1e-9);

        // Never worse than doing nothing, in the same units
        let identity_energy = optimizer.energy(&places, &identity);
        assert!(tour.total_distance_km <= identity_energy / 2.0 + 1e-9);
    }

    #[test]
    fn test_optimize_batch() {
        let requests = vec![
            scattered_places(6, 1),
            vec![place("solo", 0.0, 0.0)],
            scattered_places(4, 2),
        ];
        let results = seeded(5).optimize_batch(&requests);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().order.len(), 6);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().order.len(), 4);
    }
}
