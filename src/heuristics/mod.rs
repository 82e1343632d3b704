//! Heuristics module for the Ring-Star Problem.
//!
//! This module exports the construction and improvement heuristics and the
//! multi-start [`HeuristicSolver`] that combines them.

pub mod annealing;
pub mod construction;
pub mod local_search;

pub use annealing::*;
pub use construction::*;
pub use local_search::*;

use crate::error::{RspError, RspResult};
use crate::evaluation::{evaluate_detailed, Objective};
use crate::instance::Instance;
use crate::params::Parameters;
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Heuristic solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Selection rules, each constructed and improved once
    pub selections: Vec<HubSelection>,
    pub ring: RingConstruction,
    /// Additional random-selection starts
    pub random_restarts: usize,
    /// Use first improvement instead of best improvement
    pub first_improvement: bool,
    /// Maximum accepted moves per local search
    pub max_iterations: usize,
    /// Wall-clock budget in seconds for the whole run
    pub time_limit: Option<f64>,
    /// Run simulated annealing on the best start
    pub annealing: Option<AnnealingConfig>,
    /// Seed for the randomized steps; drawn at random when absent
    pub seed: Option<u64>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        HeuristicConfig {
            selections: vec![HubSelection::FarthestPoint, HubSelection::Grid],
            ring: RingConstruction::NearestNeighbor,
            random_restarts: 2,
            first_improvement: false,
            max_iterations: 1000,
            time_limit: None,
            annealing: None,
            seed: None,
        }
    }
}

/// Multi-start construction + local search, optionally followed by annealing
pub struct HeuristicSolver {
    config: HeuristicConfig,
}

impl HeuristicSolver {
    pub fn new(config: HeuristicConfig) -> Self {
        HeuristicSolver { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    fn constructions(&self, rng: &mut ChaCha8Rng) -> Vec<RingStarConstruction> {
        let mut selections = self.config.selections.clone();
        if selections.is_empty() {
            selections.push(HubSelection::FarthestPoint);
        }
        let mut starts: Vec<RingStarConstruction> = selections
            .into_iter()
            .map(|selection| RingStarConstruction::new(selection, self.config.ring, rng.gen()))
            .collect();
        starts.extend(
            (0..self.config.random_restarts)
                .map(|_| RingStarConstruction::new(HubSelection::Random, self.config.ring, rng.gen())),
        );
        starts
    }

    pub fn solve(&self, instance: &Instance, params: &Parameters) -> RspResult<Solution> {
        params.validate(instance)?;
        let start = Instant::now();
        let deadline = self
            .config
            .time_limit
            .and_then(|t| Duration::try_from_secs_f64(t).ok())
            .and_then(|t| start.checked_add(t));

        let seed = match self.config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen();
                log::info!("No heuristic seed given, using {}", seed);
                seed
            }
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let objective = Objective::from(params);
        let search = RingStarLocalSearch::new(self.config.first_improvement, self.config.max_iterations, None);
        let mut iterations = 0;
        let mut best: Option<(Solution, f64)> = None;

        for construction in self.constructions(&mut rng) {
            if best.is_some() && deadline.map_or(false, |d| Instant::now() >= d) {
                log::debug!("Heuristic time budget reached, skipping remaining starts");
                break;
            }
            let mut candidate = construction.construct(instance, params);
            iterations += search.run_until(instance, params, &mut candidate, deadline);
            let cost = objective.cost(instance, &candidate);
            log::debug!("{} start: {:.4}", construction.name(), cost);

            if best.as_ref().map_or(true, |(_, c)| cost < *c) {
                best = Some((candidate, cost));
            }
        }

        let (mut solution, mut cost) =
            best.ok_or_else(|| RspError::infeasible("no construction produced a start solution"))?;
        let construction = solution.algorithm.clone();
        let mut stages = "LS";

        if let Some(schedule) = &self.config.annealing {
            let sa = SimulatedAnnealing::new(schedule.clone());
            let (mut annealed, trials) = sa.anneal(instance, params, &solution, &mut rng, deadline);
            iterations += trials;
            iterations += search.run_until(instance, params, &mut annealed, deadline);
            let annealed_cost = objective.cost(instance, &annealed);
            if annealed_cost < cost {
                solution = annealed;
                cost = annealed_cost;
            }
            stages = "LS+SA";
        }

        solution.canonicalize();
        solution.algorithm = format!("Heuristic({}+{})", construction, stages);
        solution.computation_time = start.elapsed().as_secs_f64();
        solution.iterations = Some(iterations);
        solution.seed = Some(seed);

        let evaluation = evaluate_detailed(instance, params, &solution)?;
        log::info!(
            "Heuristic on {} (P={}, alpha={}): cost {:.4} (ring {:.4}, star {:.4}) in {:.3}s",
            instance.name,
            params.hubs,
            params.alpha,
            cost,
            evaluation.ring_length,
            evaluation.star_cost,
            solution.computation_time
        );
        Ok(solution)
    }
}

impl Default for HeuristicSolver {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::evaluate;
    use proptest::prelude::*;

    fn scattered(n: usize) -> Instance {
        let coords: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let t = i as f64;
                ((t * 37.0) % 50.0, (t * t * 11.0) % 40.0 + t * 0.01)
            })
            .collect();
        Instance::from_coords("scattered", &coords).unwrap()
    }

    #[test]
    fn test_same_seed_same_solution() {
        let inst = scattered(15);
        let params = Parameters::new(5, 0.4);
        let config = HeuristicConfig { seed: Some(11), ..Default::default() };
        let a = HeuristicSolver::new(config.clone()).solve(&inst, &params).unwrap();
        let b = HeuristicSolver::new(config).solve(&inst, &params).unwrap();
        assert_eq!(a.ring, b.ring);
        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.seed, Some(11));
    }

    #[test]
    fn test_seed_is_recorded_when_drawn() {
        let inst = scattered(8);
        let sol = HeuristicSolver::default().solve(&inst, &Parameters::new(3, 0.5)).unwrap();
        let seed = sol.seed.unwrap();
        let replay = HeuristicSolver::new(HeuristicConfig { seed: Some(seed), ..Default::default() })
            .solve(&inst, &Parameters::new(3, 0.5))
            .unwrap();
        assert_eq!(sol.ring, replay.ring);
    }

    #[test]
    fn test_square_plus_center() {
        let inst = Instance::from_coords("sq", &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 5.0)]).unwrap();
        let params = Parameters::new(4, 0.5);
        let sol = HeuristicSolver::new(HeuristicConfig { seed: Some(1), ..Default::default() }).solve(&inst, &params).unwrap();
        let cost = evaluate(&inst, &params, &sol).unwrap();
        assert!((cost - (10.0 + 1.5 * 50f64.sqrt())).abs() < 1e-9);
        assert!(sol.algorithm.starts_with("Heuristic("));
    }

    #[test]
    fn test_annealing_run_is_feasible() {
        let inst = scattered(12);
        let params = Parameters::new(4, 0.7).with_depot(3);
        let config = HeuristicConfig {
            seed: Some(3),
            annealing: Some(AnnealingConfig { initial_temperature: 10.0, final_temperature: 1.0, ..Default::default() }),
            ..Default::default()
        };
        let sol = HeuristicSolver::new(config).solve(&inst, &params).unwrap();
        assert!(sol.algorithm.ends_with("+LS+SA)"));
        assert!(sol.is_hub(3));
        assert!(evaluate(&inst, &params, &sol).is_ok());
    }

    #[test]
    fn test_invalid_parameters() {
        let inst = scattered(5);
        let err = HeuristicSolver::default().solve(&inst, &Parameters::new(1, 0.5)).unwrap_err();
        assert!(matches!(err, RspError::InvalidInstance(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_heuristic_solutions_are_feasible(
            coords in prop::collection::vec((0.0f64..100.0, 0.0f64..100.0), 3..15),
            alpha in 0.0f64..=1.0,
            hub_pick in 0usize..100,
            seed in any::<u64>(),
        ) {
            let inst = Instance::from_coords("rand", &coords).unwrap();
            let n = inst.dimension;
            let hubs = 2 + hub_pick % (n - 1);
            let params = Parameters::new(hubs, alpha);
            let sol = HeuristicSolver::new(HeuristicConfig { seed: Some(seed), ..Default::default() })
                .solve(&inst, &params)
                .unwrap();
            prop_assert!(evaluate(&inst, &params, &sol).is_ok());
        }
    }
}
