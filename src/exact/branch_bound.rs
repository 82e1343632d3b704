//! Built-in branch-and-bound backend.
//!
//! LP relaxations are solved with `minilp`; the tree is explored depth-first,
//! branching on the fractional integer variable with the highest priority
//! (most fractional within a priority class). The search honours the time and
//! node budgets of [`SolveLimits`] and returns the incumbent found so far when
//! either runs out.

use super::model::{MipModel, MipOutcome, MipStatus, Sense};
use super::{MipBackend, SolveLimits};
use crate::error::{RspError, RspResult};
use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};
use std::time::Instant;

const INTEGRALITY_TOL: f64 = 1e-6;
const FEASIBILITY_TOL: f64 = 1e-6;

/// Subproblem: the model with tightened variable bounds
struct TreeNode {
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// LP bound of the parent
    bound: f64,
}

/// Depth-first branch-and-bound over `minilp` relaxations
#[derive(Debug, Clone, Default)]
pub struct BranchAndBound;

impl BranchAndBound {
    pub fn new() -> Self {
        BranchAndBound
    }

    /// Solve the LP relaxation under the given bounds. `None` means infeasible.
    fn solve_relaxation(&self, model: &MipModel, lower: &[f64], upper: &[f64]) -> RspResult<Option<(f64, Vec<f64>)>> {
        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<minilp::Variable> = model
            .vars
            .iter()
            .enumerate()
            .map(|(i, var)| problem.add_var(var.objective, (lower[i], upper[i])))
            .collect();

        for constraint in &model.constraints {
            let mut expr = LinearExpr::empty();
            for &(var, coeff) in &constraint.expr.terms {
                expr.add(vars[var.0], coeff);
            }
            let op = match constraint.sense {
                Sense::Le => ComparisonOp::Le,
                Sense::Ge => ComparisonOp::Ge,
                Sense::Eq => ComparisonOp::Eq,
            };
            problem.add_constraint(expr, op, constraint.rhs);
        }

        match problem.solve() {
            Ok(solution) => {
                let values = vars.iter().map(|&v| solution[v]).collect();
                Ok(Some((solution.objective(), values)))
            }
            Err(minilp::Error::Infeasible) => Ok(None),
            Err(e) => Err(RspError::backend(format!("LP relaxation failed: {}", e))),
        }
    }

    /// Pick the branching variable and its fractional value, if any.
    fn select_branch(&self, model: &MipModel, values: &[f64]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, u8, f64)> = None;
        for (i, var) in model.vars.iter().enumerate() {
            if !var.domain.is_integral() {
                continue;
            }
            let frac = values[i] - values[i].floor();
            let distance = frac.min(1.0 - frac);
            if distance <= INTEGRALITY_TOL {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, prio, dist)) => var.priority > prio || (var.priority == prio && distance > dist + 1e-12),
            };
            if better {
                best = Some((i, var.priority, distance));
            }
        }
        best.map(|(i, _, _)| (i, values[i]))
    }

    /// Snap integer variables of an integral relaxation to exact integers.
    ///
    /// If the snapped point drifts outside the tolerance (big-M rows amplify
    /// rounding), the integers are fixed and the continuous part is re-solved.
    fn round_integral(&self, model: &MipModel, values: &[f64]) -> RspResult<Option<Vec<f64>>> {
        let rounded: Vec<f64> = model
            .vars
            .iter()
            .zip(values)
            .map(|(var, &x)| if var.domain.is_integral() { x.round() } else { x })
            .collect();
        if model.is_feasible(&rounded, FEASIBILITY_TOL) {
            return Ok(Some(rounded));
        }

        let (lower, upper): (Vec<f64>, Vec<f64>) = model
            .vars
            .iter()
            .zip(&rounded)
            .map(|(var, &x)| if var.domain.is_integral() { (x, x) } else { var.domain.bounds() })
            .unzip();
        let Some((_, resolved)) = self.solve_relaxation(model, &lower, &upper)? else {
            return Ok(None);
        };
        let snapped: Vec<f64> = model
            .vars
            .iter()
            .zip(resolved.iter().zip(&rounded))
            .map(|(var, (&x, &r))| if var.domain.is_integral() { r } else { x })
            .collect();
        Ok(model.is_feasible(&snapped, FEASIBILITY_TOL).then_some(snapped))
    }
}

impl MipBackend for BranchAndBound {
    fn name(&self) -> &str {
        "branch-and-bound"
    }

    fn solve(&self, model: &MipModel, limits: &SolveLimits, start: Option<&[f64]>) -> RspResult<MipOutcome> {
        let started = Instant::now();

        let mut incumbent: Option<(f64, Vec<f64>)> = None;
        if let Some(values) = start {
            if model.is_feasible(values, FEASIBILITY_TOL) {
                incumbent = Some((model.objective_value(values), values.to_vec()));
            } else {
                log::warn!(
                    "Ignoring infeasible MIP start (violates {})",
                    model.first_violation(values, FEASIBILITY_TOL).unwrap_or("variable bounds")
                );
            }
        }

        let (lower, upper): (Vec<f64>, Vec<f64>) = model.vars.iter().map(|v| v.domain.bounds()).unzip();
        let mut stack = vec![TreeNode { lower, upper, bound: f64::NEG_INFINITY }];
        let mut nodes_explored = 0u64;
        let mut exhausted = false;

        let cutoff = |best: f64| best - (limits.mip_gap * best.abs()).max(1e-9);

        while let Some(node) = stack.pop() {
            let out_of_time = started.elapsed() >= limits.time_limit;
            let out_of_nodes = limits.node_limit.map_or(false, |limit| nodes_explored >= limit);
            if out_of_time || out_of_nodes {
                stack.push(node);
                exhausted = true;
                break;
            }

            if let Some((best, _)) = &incumbent {
                if node.bound >= cutoff(*best) {
                    continue;
                }
            }

            nodes_explored += 1;
            if limits.verbose && nodes_explored % 1000 == 0 {
                log::info!(
                    "B&B: {} nodes, {} open, incumbent {:?}",
                    nodes_explored,
                    stack.len(),
                    incumbent.as_ref().map(|(o, _)| *o)
                );
            }

            let Some((objective, values)) = self.solve_relaxation(model, &node.lower, &node.upper)? else {
                continue;
            };

            if let Some((best, _)) = &incumbent {
                if objective >= cutoff(*best) {
                    continue;
                }
            }

            match self.select_branch(model, &values) {
                None => {
                    let Some(rounded) = self.round_integral(model, &values)? else {
                        log::debug!("Integral relaxation failed the feasibility check after rounding");
                        continue;
                    };
                    let value = model.objective_value(&rounded);
                    let improves = incumbent.as_ref().map_or(true, |(best, _)| value < *best);
                    if improves {
                        log::debug!("B&B: new incumbent {:.4} at node {}", value, nodes_explored);
                        incumbent = Some((value, rounded));
                    }
                }
                Some((var, value)) => {
                    let floor = value.floor();
                    let ceil = value.ceil();

                    let mut down = TreeNode { lower: node.lower.clone(), upper: node.upper.clone(), bound: objective };
                    down.upper[var] = floor;
                    let mut up = TreeNode { lower: node.lower, upper: node.upper, bound: objective };
                    up.lower[var] = ceil;

                    // the child pushed last is explored first
                    if value - floor >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }

        let incumbent_objective = incumbent.as_ref().map(|(o, _)| *o);
        let (status, bound) = if exhausted {
            let open_bound = stack.iter().map(|n| n.bound).fold(f64::INFINITY, f64::min);
            match incumbent_objective {
                Some(best) => (MipStatus::Feasible, open_bound.min(best)),
                None => (MipStatus::NoSolution, open_bound),
            }
        } else {
            match incumbent_objective {
                Some(best) => (MipStatus::Optimal, best),
                None => (MipStatus::Infeasible, f64::INFINITY),
            }
        };

        log::debug!(
            "B&B finished: {:?} after {} nodes in {:.3}s",
            status,
            nodes_explored,
            started.elapsed().as_secs_f64()
        );

        Ok(MipOutcome {
            status,
            objective: incumbent_objective,
            values: incumbent.map(|(_, v)| v),
            bound,
            nodes_explored,
        })
    }
}
