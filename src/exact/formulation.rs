//! Mixed-integer formulation of the Ring-Star Problem.
//!
//! The formulation uses:
//! - Binary variables y[i] for hub selection
//! - Binary variables x[i][j] for ring arcs (directed, i != j)
//! - Binary variables z[i][j] for the assignment of node i to hub j
//! - Binary variables r[i] choosing the ring root (the lowest-index hub), omitted with a depot
//! - Continuous variables u[i] for MTZ subtour elimination (position along the ring)
//!
//! The cutting-plane variant drops r and u. Subtours are then removed by cuts
//! separated from integral solutions and added between solves.

use super::model::{LinExpr, MipModel, Sense, VarDomain, VarId};
use crate::error::{RspError, RspResult};
use crate::evaluation::Objective;
use crate::instance::Instance;
use crate::params::Parameters;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};

const HUB_PRIORITY: u8 = 3;
const ROOT_PRIORITY: u8 = 2;
const ARC_PRIORITY: u8 = 1;
const ASSIGN_PRIORITY: u8 = 0;

/// How subtours are excluded from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulationKind {
    /// MTZ ordering variables, polynomial size
    #[default]
    Compact,
    /// No ordering variables; subtour cuts are added as they are found
    CuttingPlane,
}

/// Ring-Star model together with the variable layout needed to read it back
pub struct RingStarFormulation {
    pub model: MipModel,
    kind: FormulationKind,
    n: usize,
    hubs: usize,
    depot: Option<usize>,
    y: Vec<VarId>,
    x: Vec<Vec<Option<VarId>>>,
    z: Vec<Vec<VarId>>,
    r: Option<Vec<VarId>>,
    u: Option<Vec<VarId>>,
    cuts: usize,
}

impl RingStarFormulation {
    /// Build the compact model. Parameters are assumed validated.
    pub fn build(instance: &Instance, params: &Parameters) -> Self {
        Self::build_with(instance, params, FormulationKind::Compact)
    }

    pub fn build_with(instance: &Instance, params: &Parameters, kind: FormulationKind) -> Self {
        let n = instance.dimension;
        let compact = kind == FormulationKind::Compact;
        let p = params.hubs;
        let big_m = p as f64;
        let objective = Objective::from(params);
        let mut model = MipModel::new("RingStar");

        let y: Vec<VarId> = (0..n)
            .map(|i| model.add_binary(format!("y_{}", i), 0.0, HUB_PRIORITY))
            .collect();

        let x: Vec<Vec<Option<VarId>>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        (i != j).then(|| {
                            model.add_binary(
                                format!("x_{}_{}", i, j),
                                objective.ring_weight() * instance.distance(i, j),
                                ARC_PRIORITY,
                            )
                        })
                    })
                    .collect()
            })
            .collect();

        let z: Vec<Vec<VarId>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        model.add_binary(
                            format!("z_{}_{}", i, j),
                            objective.star_weight() * instance.distance(i, j),
                            ASSIGN_PRIORITY,
                        )
                    })
                    .collect()
            })
            .collect();

        let r: Option<Vec<VarId>> = (compact && params.depot.is_none()).then(|| {
            (0..n)
                .map(|i| model.add_binary(format!("r_{}", i), 0.0, ROOT_PRIORITY))
                .collect()
        });

        let u: Option<Vec<VarId>> = compact.then(|| {
            (0..n)
                .map(|i| {
                    let upper = if Some(i) == params.depot { 0.0 } else { big_m - 1.0 };
                    model.add_var(format!("u_{}", i), VarDomain::Continuous { lower: 0.0, upper }, 0.0, 0)
                })
                .collect()
        });

        // Cardinality: exactly P hubs
        model.add_constraint("cardinality".into(), LinExpr::sum(y.iter().copied()), Sense::Eq, p as f64);

        if let Some(depot) = params.depot {
            model.add_constraint("depot".into(), LinExpr::new().term(y[depot], 1.0), Sense::Eq, 1.0);
        }

        for i in 0..n {
            // Degree: one arc out of and one arc into every hub, none for non-hubs
            let out = LinExpr::sum((0..n).filter_map(|j| x[i][j])).term(y[i], -1.0);
            model.add_constraint(format!("out_{}", i), out, Sense::Eq, 0.0);
            let inc = LinExpr::sum((0..n).filter_map(|j| x[j][i])).term(y[i], -1.0);
            model.add_constraint(format!("in_{}", i), inc, Sense::Eq, 0.0);

            for j in 0..n {
                let Some(arc) = x[i][j] else { continue };
                model.add_constraint(format!("arc_tail_{}_{}", i, j), LinExpr::new().term(arc, 1.0).term(y[i], -1.0), Sense::Le, 0.0);
                model.add_constraint(format!("arc_head_{}_{}", i, j), LinExpr::new().term(arc, 1.0).term(y[j], -1.0), Sense::Le, 0.0);
                if p >= 3 && i < j {
                    if let Some(back) = x[j][i] {
                        model.add_constraint(format!("two_cycle_{}_{}", i, j), LinExpr::sum([arc, back]), Sense::Le, 1.0);
                    }
                }
            }

            // Assignment: every node served by exactly one hub, hubs serve themselves
            model.add_constraint(format!("assign_{}", i), LinExpr::sum(z[i].iter().copied()), Sense::Eq, 1.0);
            model.add_constraint(format!("self_{}", i), LinExpr::new().term(z[i][i], 1.0).term(y[i], -1.0), Sense::Eq, 0.0);
            for j in 0..n {
                if i != j {
                    model.add_constraint(format!("serve_{}_{}", i, j), LinExpr::new().term(z[i][j], 1.0).term(y[j], -1.0), Sense::Le, 0.0);
                }
            }
        }

        // Root selection: the lowest-index hub
        if let Some(r) = &r {
            model.add_constraint("root".into(), LinExpr::sum(r.iter().copied()), Sense::Eq, 1.0);
            for i in 0..n {
                model.add_constraint(format!("root_hub_{}", i), LinExpr::new().term(r[i], 1.0).term(y[i], -1.0), Sense::Le, 0.0);
                for k in 0..i {
                    model.add_constraint(format!("root_lowest_{}_{}", i, k), LinExpr::sum([r[i], y[k]]), Sense::Le, 1.0);
                }
            }
        }

        // MTZ ordering along the ring, relaxed on arcs entering the root
        let Some(u) = u else {
            return RingStarFormulation { model, kind, n, hubs: p, depot: params.depot, y, x, z, r, u: None, cuts: 0 };
        };
        for i in 0..n {
            let upper = LinExpr::new().term(u[i], 1.0).term(y[i], -(big_m - 1.0));
            let mut lower = LinExpr::new().term(u[i], 1.0).term(y[i], -1.0);
            match &r {
                Some(r) => {
                    model.add_constraint(format!("order_root_{}", i), LinExpr::new().term(u[i], 1.0).term(r[i], big_m - 1.0), Sense::Le, big_m - 1.0);
                    lower.add(r[i], 1.0);
                    model.add_constraint(format!("order_lb_{}", i), lower, Sense::Ge, 0.0);
                }
                None if Some(i) != params.depot => {
                    model.add_constraint(format!("order_lb_{}", i), lower, Sense::Ge, 0.0);
                }
                None => {}
            }
            model.add_constraint(format!("order_ub_{}", i), upper, Sense::Le, 0.0);

            for j in 0..n {
                let Some(arc) = x[i][j] else { continue };
                if Some(j) == params.depot {
                    continue;
                }
                let mut mtz = LinExpr::new().term(u[j], 1.0).term(u[i], -1.0).term(arc, -big_m);
                if let Some(r) = &r {
                    mtz.add(r[j], big_m);
                }
                model.add_constraint(format!("mtz_{}_{}", i, j), mtz, Sense::Ge, 1.0 - big_m);
            }
        }

        RingStarFormulation { model, kind, n, hubs: p, depot: params.depot, y, x, z, r, u: Some(u), cuts: 0 }
    }

    pub fn kind(&self) -> FormulationKind {
        self.kind
    }

    /// Number of subtour cuts added so far
    pub fn cuts(&self) -> usize {
        self.cuts
    }

    /// Cycles formed by the selected arcs, one vector of hubs per cycle. A
    /// chain that never closes is reported as a component of its own.
    pub fn components(&self, values: &[f64]) -> Vec<Vec<usize>> {
        let is_set = |var: VarId| values[var.0] > 0.5;
        let mut visited = vec![false; self.n];
        let mut components = Vec::new();

        for start in (0..self.n).filter(|&i| is_set(self.y[i])) {
            if visited[start] {
                continue;
            }
            let mut cycle = Vec::new();
            let mut current = start;
            while !visited[current] {
                visited[current] = true;
                cycle.push(current);
                match (0..self.n).find(|&j| self.x[current][j].map_or(false, &is_set)) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            components.push(cycle);
        }
        components
    }

    /// Add cuts excluding the subtours of `components`; returns how many were added.
    ///
    /// For a component S with lowest node k and every node l outside S:
    /// `sum of x[i][j] over i in S, j not in S >= y[k] + y[l] - 1`.
    pub fn add_subtour_cuts(&mut self, components: &[Vec<usize>]) -> usize {
        if components.len() < 2 {
            return 0;
        }
        let mut added = 0;
        for component in components {
            let mut inside = vec![false; self.n];
            for &v in component {
                inside[v] = true;
            }
            let Some(&k) = component.iter().min() else { continue };

            let n = self.n;
            let x = &self.x;
            let outside = |j: usize| !inside[j];
            let crossing: Vec<VarId> = component
                .iter()
                .flat_map(move |&i| (0..n).filter(move |&j| outside(j)).filter_map(move |j| x[i][j]))
                .collect();

            for l in (0..self.n).filter(|&l| !inside[l]) {
                let expr = LinExpr::sum(crossing.iter().copied()).term(self.y[k], -1.0).term(self.y[l], -1.0);
                let name = format!("subtour_{}_{}_{}", self.cuts, k, l);
                self.model.add_constraint(name, expr, Sense::Ge, -1.0);
                self.cuts += 1;
                added += 1;
            }
        }
        added
    }

    fn root_of(&self, ring: &[usize]) -> Option<usize> {
        self.depot.or_else(|| ring.iter().copied().min())
    }

    /// Variable values encoding a feasible solution, for use as a MIP start.
    pub fn start_values(&self, solution: &Solution) -> Vec<f64> {
        let mut values = vec![0.0; self.model.num_vars()];
        let Some(root) = self.root_of(&solution.ring) else {
            return values;
        };
        let Some(root_pos) = solution.position(root) else {
            return values;
        };

        let mut ring = solution.ring.clone();
        ring.rotate_left(root_pos);
        let p = ring.len();

        for (k, &h) in ring.iter().enumerate() {
            values[self.y[h].0] = 1.0;
            if let Some(u) = &self.u {
                values[u[h].0] = k as f64;
            }
            if let Some(arc) = self.x[h][ring[(k + 1) % p]] {
                values[arc.0] = 1.0;
            }
        }
        if let Some(r) = &self.r {
            values[r[root].0] = 1.0;
        }
        for (v, &h) in solution.assignment.iter().enumerate() {
            if v < self.n && h < self.n {
                values[self.z[v][h].0] = 1.0;
            }
        }
        values
    }

    /// Read the ring and assignment back out of variable values.
    pub fn extract(&self, values: &[f64], algorithm: &str) -> RspResult<Solution> {
        let is_set = |var: VarId| values[var.0] > 0.5;

        let hubs: Vec<usize> = (0..self.n).filter(|&i| is_set(self.y[i])).collect();
        if hubs.len() != self.hubs {
            return Err(RspError::infeasible_solution(format!(
                "backend selected {} hubs, expected {}",
                hubs.len(),
                self.hubs
            )));
        }

        let root = match &self.r {
            Some(r) => hubs.iter().copied().find(|&i| is_set(r[i])),
            None => self.depot,
        }
        .or_else(|| hubs.first().copied())
        .ok_or_else(|| RspError::infeasible_solution("backend selected no hubs"))?;

        let mut ring = vec![root];
        let mut current = root;
        for _ in 1..self.hubs {
            let next = (0..self.n)
                .find(|&j| self.x[current][j].map_or(false, &is_set))
                .ok_or_else(|| RspError::infeasible_solution(format!("ring breaks after hub {}", current)))?;
            if ring.contains(&next) {
                return Err(RspError::infeasible_solution(format!(
                    "ring closes after {} of {} hubs (subtour)",
                    ring.len(),
                    self.hubs
                )));
            }
            ring.push(next);
            current = next;
        }
        let closes = self.x[current][root].map_or(false, &is_set);
        if !closes {
            return Err(RspError::infeasible_solution("ring does not return to its start"));
        }

        let assignment = (0..self.n)
            .map(|v| {
                (0..self.n)
                    .find(|&j| is_set(self.z[v][j]))
                    .ok_or_else(|| RspError::infeasible_solution(format!("node {} is unassigned", v)))
            })
            .collect::<RspResult<Vec<usize>>>()?;

        Ok(Solution::new(ring, assignment, algorithm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Instance {
        Instance::from_coords("sq", &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 5.0)]).unwrap()
    }

    #[test]
    fn test_start_values_are_feasible_and_priced() {
        let inst = square();
        let params = Parameters::new(4, 0.5);
        let form = RingStarFormulation::build(&inst, &params);
        let sol = Solution::from_ring(&inst, vec![2, 1, 0, 3], "warm");
        let values = form.start_values(&sol);

        assert!(form.model.is_feasible(&values, 1e-9), "violates {:?}", form.model.first_violation(&values, 1e-9));
        let expected = crate::evaluation::evaluate(&inst, &params, &sol).unwrap();
        assert!((form.model.objective_value(&values) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_start_values_with_depot_and_two_hubs() {
        let inst = square();
        let params = Parameters::new(2, 0.3).with_depot(4);
        let form = RingStarFormulation::build(&inst, &params);
        let sol = Solution::from_ring(&inst, vec![1, 4], "warm");
        let values = form.start_values(&sol);
        assert!(form.model.is_feasible(&values, 1e-9), "violates {:?}", form.model.first_violation(&values, 1e-9));
    }

    #[test]
    fn test_subtours_are_infeasible() {
        // two disjoint 2-cycles on six nodes with P = 4
        let inst = Instance::from_coords(
            "six",
            &[(0.0, 0.0), (1.0, 0.0), (10.0, 0.0), (11.0, 0.0), (5.0, 5.0), (5.0, -5.0)],
        )
        .unwrap();
        let params = Parameters::new(4, 0.5);
        let form = RingStarFormulation::build(&inst, &params);

        let sol = Solution::from_ring(&inst, vec![0, 1, 2, 3], "ok");
        let mut values = form.start_values(&sol);
        assert!(form.model.is_feasible(&values, 1e-9));

        // rewire into 0 <-> 1 and 2 <-> 3
        for v in values.iter_mut() {
            *v = v.round();
        }
        let set = |values: &mut Vec<f64>, i: usize, j: usize, val: f64| {
            if let Some(arc) = form.x[i][j] {
                values[arc.0] = val;
            }
        };
        set(&mut values, 1, 2, 0.0);
        set(&mut values, 3, 0, 0.0);
        set(&mut values, 1, 0, 1.0);
        set(&mut values, 3, 2, 1.0);
        let u = form.u.as_ref().unwrap();
        for k in 0..4 {
            values[u[k].0] = [0.0, 1.0, 1.0, 2.0][k];
        }
        assert!(!form.model.is_feasible(&values, 1e-9));
    }

    #[test]
    fn test_extract_round_trip() {
        let inst = square();
        let params = Parameters::new(4, 0.5);
        let form = RingStarFormulation::build(&inst, &params);
        let sol = Solution::from_ring(&inst, vec![3, 2, 1, 0], "warm");
        let back = form.extract(&form.start_values(&sol), "exact").unwrap();
        assert_eq!(back.ring, vec![0, 3, 2, 1]);
        assert_eq!(back.assignment, sol.assignment);
    }

    #[test]
    fn test_cutting_plane_separates_subtours() {
        let inst = Instance::from_coords(
            "triangles",
            &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (100.0, 0.0), (101.0, 0.0), (100.1, 1.0)],
        )
        .unwrap();
        let params = Parameters::new(6, 0.5);
        let mut form = RingStarFormulation::build_with(&inst, &params, FormulationKind::CuttingPlane);
        assert!(form.u.is_none() && form.r.is_none());

        let tour = Solution::from_ring(&inst, vec![0, 1, 4, 3, 5, 2], "tour");
        let tour_values = form.start_values(&tour);
        assert_eq!(form.components(&tour_values), vec![vec![0, 1, 4, 3, 5, 2]]);
        assert_eq!(form.add_subtour_cuts(&form.components(&tour_values)), 0);

        // 0 -> 1 -> 2 -> 0 and 3 -> 4 -> 5 -> 3
        let mut split = tour_values.clone();
        for i in 0..6 {
            for j in 0..6 {
                if let Some(arc) = form.x[i][j] {
                    split[arc.0] = 0.0;
                }
            }
        }
        for (i, j) in [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)] {
            split[form.x[i][j].unwrap().0] = 1.0;
        }
        assert!(form.model.is_feasible(&split, 1e-9));

        let components = form.components(&split);
        assert_eq!(components.len(), 2);
        assert_eq!(form.add_subtour_cuts(&components), 6);
        assert_eq!(form.cuts(), 6);
        assert!(!form.model.is_feasible(&split, 1e-9));
        assert!(form.model.is_feasible(&tour_values, 1e-9));
    }
}
