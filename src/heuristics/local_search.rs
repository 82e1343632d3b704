//! Local search improvement heuristics for the Ring-Star Problem.
//!
//! Two neighbourhoods:
//! - 2-opt on the ring (hub membership unchanged, accepted when the ring shortens)
//! - Hub swap (a hub leaves the ring, a non-hub enters, the star is reassigned)

use super::construction::cheapest_insertion_position;
use crate::evaluation::Objective;
use crate::instance::Instance;
use crate::params::Parameters;
use crate::solution::{nearest_assignment, Move, Solution};
use std::time::{Duration, Instant};

const IMPROVEMENT_EPS: f64 = 1e-9;

/// Trait for local search improvement methods
pub trait LocalSearch {
    fn improve(&self, instance: &Instance, params: &Parameters, solution: &mut Solution) -> bool;
    fn name(&self) -> &str;
}

/// 2-Opt on the ring
///
/// Reverses ring segments while that strictly reduces the ring length.
pub struct TwoOptSearch {
    /// Use first improvement instead of best improvement
    pub first_improvement: bool,
}

impl TwoOptSearch {
    pub fn new() -> Self {
        TwoOptSearch { first_improvement: false }
    }

    pub fn first_improvement() -> Self {
        TwoOptSearch { first_improvement: true }
    }

    /// Next improving move and its ring length change
    pub fn find_move(&self, instance: &Instance, solution: &Solution) -> Option<(Move, f64)> {
        let p = solution.ring.len();
        if p < 4 {
            return None;
        }

        let mut best: Option<(Move, f64)> = None;
        for i in 0..p - 2 {
            for j in i + 2..p {
                if i == 0 && j == p - 1 {
                    continue; // same cycle, reversed
                }
                let delta = solution.two_opt_delta(instance, i, j);
                if delta < -IMPROVEMENT_EPS && best.map_or(true, |(_, d)| delta < d) {
                    best = Some((Move::TwoOpt(i, j), delta));
                    if self.first_improvement {
                        return best;
                    }
                }
            }
        }
        best
    }
}

impl Default for TwoOptSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for TwoOptSearch {
    fn improve(&self, instance: &Instance, _params: &Parameters, solution: &mut Solution) -> bool {
        let mut improved = false;
        while let Some((mv, _)) = self.find_move(instance, solution) {
            mv.apply(solution);
            improved = true;
        }
        improved
    }

    fn name(&self) -> &str {
        if self.first_improvement {
            "2-Opt-FI"
        } else {
            "2-Opt-BI"
        }
    }
}

/// Hub swap
///
/// Replaces a hub (never the depot) by a non-hub. The entering node either takes
/// the leaving hub's ring position or is re-inserted where it is cheapest,
/// whichever gives the shorter ring; the star is reassigned to the nearest hubs.
pub struct HubSwapSearch {
    pub first_improvement: bool,
}

impl HubSwapSearch {
    pub fn new() -> Self {
        HubSwapSearch { first_improvement: false }
    }

    pub fn first_improvement() -> Self {
        HubSwapSearch { first_improvement: true }
    }

    /// Star cost once `hubs` are the hub set
    fn star_cost_with(instance: &Instance, hubs: &[usize]) -> f64 {
        (0..instance.dimension)
            .map(|v| {
                hubs.iter()
                    .map(|&h| instance.distance(v, h))
                    .fold(f64::INFINITY, f64::min)
            })
            .sum()
    }

    /// Best ring for replacing the hub at `pos` by `node`, with its length
    fn repaired_ring(instance: &Instance, ring: &[usize], pos: usize, node: usize) -> (Move, f64) {
        let mut in_place = ring.to_vec();
        in_place[pos] = node;
        let in_place_len = instance.ring_length(&in_place);

        let mut removed = ring.to_vec();
        removed.remove(pos);
        let (at, delta) = cheapest_insertion_position(instance, &removed, node);
        let reinserted_len = instance.ring_length(&removed) + delta;

        if reinserted_len < in_place_len - IMPROVEMENT_EPS {
            (Move::HubSwap { pos, node, insert: Some(at) }, reinserted_len)
        } else {
            (Move::HubSwap { pos, node, insert: None }, in_place_len)
        }
    }

    /// Next improving move and the resulting cost
    pub fn find_move(&self, instance: &Instance, params: &Parameters, solution: &Solution) -> Option<(Move, f64)> {
        let objective = Objective::from(params);
        let current = objective.cost(instance, solution);
        let non_hubs = solution.non_hubs();
        let mut hubs = solution.ring.clone();

        let mut best: Option<(Move, f64)> = None;
        for pos in 0..solution.ring.len() {
            let leaving = solution.ring[pos];
            if Some(leaving) == params.depot {
                continue;
            }
            for &node in &non_hubs {
                hubs[pos] = node;
                let star = Self::star_cost_with(instance, &hubs);
                let (mv, ring_len) = Self::repaired_ring(instance, &solution.ring, pos, node);
                let cost = objective.combine(ring_len, star);

                let threshold = best.map_or(current - IMPROVEMENT_EPS, |(_, c)| c);
                if cost < threshold {
                    best = Some((mv, cost));
                    if self.first_improvement {
                        return best;
                    }
                }
            }
            hubs[pos] = leaving;
        }
        best
    }
}

impl Default for HubSwapSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for HubSwapSearch {
    fn improve(&self, instance: &Instance, params: &Parameters, solution: &mut Solution) -> bool {
        let mut improved = false;
        while let Some((mv, cost)) = self.find_move(instance, params, solution) {
            log::debug!("Hub swap {:?} -> {:.4}", mv, cost);
            mv.apply(solution);
            solution.reassign_nearest(instance);
            improved = true;
        }
        improved
    }

    fn name(&self) -> &str {
        if self.first_improvement {
            "HubSwap-FI"
        } else {
            "HubSwap-BI"
        }
    }
}

/// Alternates 2-opt and hub swaps until neither improves or the budget runs out
pub struct RingStarLocalSearch {
    pub two_opt: TwoOptSearch,
    pub hub_swap: HubSwapSearch,
    /// Maximum number of accepted moves
    pub max_iterations: usize,
    pub time_limit: Option<Duration>,
}

impl RingStarLocalSearch {
    pub fn new(first_improvement: bool, max_iterations: usize, time_limit: Option<Duration>) -> Self {
        RingStarLocalSearch {
            two_opt: TwoOptSearch { first_improvement },
            hub_swap: HubSwapSearch { first_improvement },
            max_iterations,
            time_limit,
        }
    }

    /// Improve `solution` in place; returns the number of accepted moves.
    pub fn run(&self, instance: &Instance, params: &Parameters, solution: &mut Solution) -> usize {
        let deadline = self.time_limit.map(|t| Instant::now() + t);
        self.run_until(instance, params, solution, deadline)
    }

    pub fn run_until(
        &self,
        instance: &Instance,
        params: &Parameters,
        solution: &mut Solution,
        deadline: Option<Instant>,
    ) -> usize {
        let mut iterations = 0;
        while iterations < self.max_iterations {
            if deadline.map_or(false, |d| Instant::now() >= d) {
                log::debug!("Local search stopped by its time budget after {} moves", iterations);
                break;
            }
            if let Some((mv, _)) = self.two_opt.find_move(instance, solution) {
                mv.apply(solution);
            } else if let Some((mv, cost)) = self.hub_swap.find_move(instance, params, solution) {
                log::debug!("Hub swap {:?} -> {:.4}", mv, cost);
                mv.apply(solution);
                solution.assignment = nearest_assignment(instance, &solution.ring);
            } else {
                break;
            }
            iterations += 1;
        }
        iterations
    }
}

impl Default for RingStarLocalSearch {
    fn default() -> Self {
        Self::new(false, 1000, None)
    }
}

impl LocalSearch for RingStarLocalSearch {
    fn improve(&self, instance: &Instance, params: &Parameters, solution: &mut Solution) -> bool {
        self.run(instance, params, solution) > 0
    }

    fn name(&self) -> &str {
        "RingStar-LS"
    }
}
