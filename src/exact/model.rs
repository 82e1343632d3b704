//! Backend-neutral mixed-integer linear model.
//!
//! Formulations build a [`MipModel`]; backends implementing
//! [`MipBackend`](super::MipBackend) consume it and hand back variable values.

use serde::{Deserialize, Serialize};

/// Index of a variable in its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Variable domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarDomain {
    Binary,
    Integer { lower: f64, upper: f64 },
    Continuous { lower: f64, upper: f64 },
}

impl VarDomain {
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            VarDomain::Binary => (0.0, 1.0),
            VarDomain::Integer { lower, upper } | VarDomain::Continuous { lower, upper } => (lower, upper),
        }
    }

    pub fn is_integral(&self) -> bool {
        !matches!(self, VarDomain::Continuous { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub domain: VarDomain,
    /// Objective coefficient (the model always minimizes)
    pub objective: f64,
    /// Higher values are branched on first
    pub priority: u8,
}

/// Linear combination of variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, var: VarId, coeff: f64) -> Self {
        self.add(var, coeff);
        self
    }

    pub fn add(&mut self, var: VarId, coeff: f64) {
        self.terms.push((var, coeff));
    }

    /// Sum of the given variables with unit coefficients
    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        LinExpr { terms: vars.into_iter().map(|v| (v, 1.0)).collect() }
    }

    pub fn value(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.0]).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.value(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Minimization model: variables, linear constraints, linear objective
#[derive(Debug, Clone, Default)]
pub struct MipModel {
    pub name: String,
    pub vars: Vec<Variable>,
    pub constraints: Vec<Constraint>,
}

impl MipModel {
    pub fn new(name: &str) -> Self {
        MipModel { name: name.to_string(), ..Default::default() }
    }

    pub fn add_var(&mut self, name: String, domain: VarDomain, objective: f64, priority: u8) -> VarId {
        self.vars.push(Variable { name, domain, objective, priority });
        VarId(self.vars.len() - 1)
    }

    pub fn add_binary(&mut self, name: String, objective: f64, priority: u8) -> VarId {
        self.add_var(name, VarDomain::Binary, objective, priority)
    }

    pub fn add_continuous(&mut self, name: String, lower: f64, upper: f64) -> VarId {
        self.add_var(name, VarDomain::Continuous { lower, upper }, 0.0, 0)
    }

    pub fn add_constraint(&mut self, name: String, expr: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint { name, expr, sense, rhs });
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.vars.iter().zip(values).map(|(v, x)| v.objective * x).sum()
    }

    /// Check bounds, integrality and every constraint within `tolerance`.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.vars.len() {
            return false;
        }
        let within_domain = self.vars.iter().zip(values).all(|(var, &x)| {
            let (lo, hi) = var.domain.bounds();
            x >= lo - tolerance
                && x <= hi + tolerance
                && (!var.domain.is_integral() || (x - x.round()).abs() <= tolerance)
        });
        within_domain && self.constraints.iter().all(|c| c.is_satisfied(values, tolerance))
    }

    /// Name of the first violated constraint, for diagnostics.
    pub fn first_violation(&self, values: &[f64], tolerance: f64) -> Option<&str> {
        self.constraints
            .iter()
            .find(|c| !c.is_satisfied(values, tolerance))
            .map(|c| c.name.as_str())
    }
}

/// Outcome status reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MipStatus {
    /// Search completed; the incumbent is optimal
    Optimal,
    /// Budget exhausted; an incumbent exists but is not proven optimal
    Feasible,
    /// Search completed; no feasible point exists
    Infeasible,
    /// Budget exhausted before any incumbent was found
    NoSolution,
}

#[derive(Debug, Clone)]
pub struct MipOutcome {
    pub status: MipStatus,
    /// Variable values of the incumbent
    pub values: Option<Vec<f64>>,
    /// Objective of the incumbent
    pub objective: Option<f64>,
    /// Best known lower bound on the optimum
    pub bound: f64,
    /// Branch-and-bound nodes explored
    pub nodes_explored: u64,
}
