//! Objective function and feasibility checks.
//!
//! Every cost reported by the crate goes through this module:
//!
//! ```text
//! cost = alpha * ring_length + (1 - alpha) * star_cost
//! ```
//!
//! `ring_length` includes the closing edge of the cycle and `star_cost` sums the
//! distance from every non-hub node to the hub serving it. No normalization is
//! applied to either term. Both solvers optimize through [`Objective`] so that
//! their costs are directly comparable.

use crate::error::{RspError, RspResult};
use crate::instance::Instance;
use crate::params::Parameters;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};

/// Weighted ring/star objective
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub alpha: f64,
}

impl Objective {
    pub fn new(alpha: f64) -> Self {
        Objective { alpha }
    }

    #[inline]
    pub fn ring_weight(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn star_weight(&self) -> f64 {
        1.0 - self.alpha
    }

    #[inline]
    pub fn combine(&self, ring_length: f64, star_cost: f64) -> f64 {
        self.ring_weight() * ring_length + self.star_weight() * star_cost
    }

    /// Cost of a solution without the feasibility checks, for search loops
    /// that only ever hold well-formed solutions.
    pub fn cost(&self, instance: &Instance, solution: &Solution) -> f64 {
        self.combine(instance.ring_length(&solution.ring), star_cost(instance, &solution.assignment))
    }
}

impl From<&Parameters> for Objective {
    fn from(params: &Parameters) -> Self {
        Objective::new(params.alpha)
    }
}

/// Cost breakdown of a solution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub ring_length: f64,
    pub star_cost: f64,
    pub cost: f64,
}

/// Sum of distances from every node to the hub serving it (hubs contribute zero).
pub fn star_cost(instance: &Instance, assignment: &[usize]) -> f64 {
    assignment
        .iter()
        .enumerate()
        .map(|(v, &h)| instance.distance(v, h))
        .sum()
}

/// Validate the ring/star invariants of a solution.
///
/// The ring must be a simple cycle over exactly P distinct nodes, the depot (if any)
/// must be on it, hubs serve themselves and every other node is served by a hub.
pub fn check_feasibility(instance: &Instance, params: &Parameters, solution: &Solution) -> RspResult<()> {
    let n = instance.dimension;

    if solution.assignment.len() != n {
        return Err(RspError::infeasible_solution(format!(
            "assignment covers {} nodes, instance has {}",
            solution.assignment.len(),
            n
        )));
    }
    if solution.ring.len() != params.hubs {
        return Err(RspError::infeasible_solution(format!(
            "ring has {} hubs, expected {}",
            solution.ring.len(),
            params.hubs
        )));
    }

    let mut is_hub = vec![false; n];
    for &h in &solution.ring {
        if h >= n {
            return Err(RspError::infeasible_solution(format!("ring node {} out of range", h)));
        }
        if is_hub[h] {
            return Err(RspError::infeasible_solution(format!("ring visits node {} twice", h)));
        }
        is_hub[h] = true;
    }

    if let Some(depot) = params.depot {
        if !is_hub[depot] {
            return Err(RspError::infeasible_solution(format!("depot {} is not on the ring", depot)));
        }
    }

    for (v, &h) in solution.assignment.iter().enumerate() {
        if is_hub[v] {
            if h != v {
                return Err(RspError::infeasible_solution(format!(
                    "hub {} is assigned to {}",
                    v, h
                )));
            }
        } else if h >= n || !is_hub[h] {
            return Err(RspError::infeasible_solution(format!(
                "node {} is assigned to non-hub {}",
                v, h
            )));
        }
    }

    Ok(())
}

/// Validate a solution and return its cost breakdown
pub fn evaluate_detailed(instance: &Instance, params: &Parameters, solution: &Solution) -> RspResult<Evaluation> {
    params.validate(instance)?;
    check_feasibility(instance, params, solution)?;

    let ring_length = instance.ring_length(&solution.ring);
    let star_cost = star_cost(instance, &solution.assignment);
    let cost = Objective::from(params).combine(ring_length, star_cost);

    Ok(Evaluation { ring_length, star_cost, cost })
}

/// Validate a solution and return its weighted cost
pub fn evaluate(instance: &Instance, params: &Parameters, solution: &Solution) -> RspResult<f64> {
    evaluate_detailed(instance, params, solution).map(|e| e.cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn square() -> Instance {
        Instance::from_coords("sq", &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 5.0)]).unwrap()
    }

    #[test]
    fn test_square_plus_center_cost() {
        let inst = square();
        let sol = Solution::from_ring(&inst, vec![0, 1, 2, 3], "test");
        let eval = evaluate_detailed(&inst, &Parameters::new(4, 0.5), &sol).unwrap();
        assert!((eval.ring_length - 40.0).abs() < 1e-9);
        assert!((eval.star_cost - 50f64.sqrt()).abs() < 1e-9);
        assert!((eval.cost - (20.0 + 0.5 * 50f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_two_hub_ring_is_out_and_back() {
        let inst = square();
        let sol = Solution::from_ring(&inst, vec![0, 2], "test");
        let eval = evaluate_detailed(&inst, &Parameters::new(2, 1.0), &sol).unwrap();
        assert!((eval.ring_length - 2.0 * 200f64.sqrt()).abs() < 1e-9);
        assert!((eval.cost - eval.ring_length).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_broken_solutions() {
        let inst = square();
        let params = Parameters::new(4, 0.5);
        let good = Solution::from_ring(&inst, vec![0, 1, 2, 3], "test");

        let mut wrong_size = good.clone();
        wrong_size.ring.pop();
        assert!(matches!(evaluate(&inst, &params, &wrong_size), Err(RspError::InfeasibleSolution(_))));

        let mut repeated = good.clone();
        repeated.ring[3] = 0;
        assert!(matches!(evaluate(&inst, &params, &repeated), Err(RspError::InfeasibleSolution(_))));

        let mut bad_assign = good.clone();
        bad_assign.assignment[4] = 4;
        assert!(matches!(evaluate(&inst, &params, &bad_assign), Err(RspError::InfeasibleSolution(_))));

        let mut hub_elsewhere = good.clone();
        hub_elsewhere.assignment[1] = 0;
        assert!(matches!(evaluate(&inst, &params, &hub_elsewhere), Err(RspError::InfeasibleSolution(_))));

        let mut short = good.clone();
        short.assignment.pop();
        assert!(matches!(evaluate(&inst, &params, &short), Err(RspError::InfeasibleSolution(_))));

        let with_depot = Parameters::new(4, 0.5).with_depot(4);
        assert!(matches!(evaluate(&inst, &with_depot, &good), Err(RspError::InfeasibleSolution(_))));
    }

    #[test]
    fn test_invalid_parameters() {
        let inst = square();
        let sol = Solution::from_ring(&inst, vec![0, 1, 2, 3], "test");
        assert!(matches!(
            evaluate(&inst, &Parameters::new(4, -0.1), &sol),
            Err(RspError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_alpha_extremes() {
        let inst = square();
        let a = Solution::from_ring(&inst, vec![0, 1, 2, 3], "a");
        let b = Solution::from_ring(&inst, vec![0, 2, 1, 3], "b");

        // alpha = 0: the ring order over the same hubs does not matter
        let p0 = Parameters::new(4, 0.0);
        assert_eq!(evaluate(&inst, &p0, &a).unwrap(), evaluate(&inst, &p0, &b).unwrap());

        // alpha = 1: the assignment does not matter
        let p1 = Parameters::new(4, 1.0);
        let mut c = a.clone();
        c.assignment[4] = 2;
        assert_eq!(evaluate(&inst, &p1, &a).unwrap(), evaluate(&inst, &p1, &c).unwrap());
    }

    proptest! {
        #[test]
        fn prop_evaluate_is_deterministic(
            coords in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 3..12),
            alpha in 0.0f64..=1.0,
            shift in 0usize..12,
        ) {
            let inst = Instance::from_coords("rand", &coords).unwrap();
            let n = inst.dimension;
            let p = 2 + shift % (n - 1);
            let ring: Vec<usize> = (0..p).collect();
            let sol = Solution::from_ring(&inst, ring, "prop");
            let params = Parameters::new(p, alpha);
            let first = evaluate(&inst, &params, &sol).unwrap();
            let second = evaluate(&inst, &params, &sol).unwrap();
            prop_assert_eq!(first, second);
            prop_assert!(first >= 0.0);
        }
    }
}
