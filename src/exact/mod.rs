//! Exact solvers module.
//!
//! The Ring-Star model is built once as a backend-neutral [`MipModel`] and handed
//! to a [`MipBackend`]. The built-in branch-and-bound backend always exists;
//! the Gurobi backend is compiled in with the `gurobi` feature.

pub mod branch_bound;
pub mod formulation;
pub mod model;
mod solver;

// When built with the `gurobi` feature, expose the real backend
#[cfg(feature = "gurobi")]
mod gurobi;
#[cfg(feature = "gurobi")]
pub use gurobi::GurobiBackend;

// Otherwise provide a stub that reports the missing feature at solve time
#[cfg(not(feature = "gurobi"))]
mod gurobi_stub {
    use super::model::{MipModel, MipOutcome};
    use super::{MipBackend, SolveLimits};
    use crate::error::{RspError, RspResult};

    #[derive(Debug, Clone, Default)]
    pub struct GurobiBackend;

    impl MipBackend for GurobiBackend {
        fn name(&self) -> &str {
            "gurobi"
        }

        fn solve(&self, _model: &MipModel, _limits: &SolveLimits, _start: Option<&[f64]>) -> RspResult<MipOutcome> {
            Err(RspError::backend("Gurobi feature not enabled in this build"))
        }
    }
}

#[cfg(not(feature = "gurobi"))]
pub use gurobi_stub::GurobiBackend;

pub use branch_bound::BranchAndBound;
pub use formulation::FormulationKind;
pub use model::{MipModel, MipOutcome, MipStatus};
pub use solver::ExactSolver;

use crate::error::RspResult;
use crate::evaluation::Evaluation;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A mixed-integer solver able to minimize a [`MipModel`]
pub trait MipBackend {
    fn name(&self) -> &str;

    /// Minimize `model` within `limits`. `start`, when given, is a candidate
    /// incumbent (one value per variable); backends ignore it if infeasible.
    fn solve(&self, model: &MipModel, limits: &SolveLimits, start: Option<&[f64]>) -> RspResult<MipOutcome>;
}

/// Budgets and tolerances handed to a backend
#[derive(Debug, Clone)]
pub struct SolveLimits {
    pub time_limit: Duration,
    /// Maximum number of branch-and-bound nodes (`None` = unlimited)
    pub node_limit: Option<u64>,
    /// Relative gap at which a subtree is pruned
    pub mip_gap: f64,
    /// Number of threads (0 = automatic, used by Gurobi only)
    pub threads: i32,
    pub verbose: bool,
}

impl Default for SolveLimits {
    fn default() -> Self {
        SolveLimits {
            time_limit: Duration::from_secs(60),
            node_limit: Some(200_000),
            mip_gap: 1e-6,
            threads: 0,
            verbose: false,
        }
    }
}

/// Which backend the exact solver delegates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    BranchAndBound,
    Gurobi,
}

impl BackendKind {
    pub fn create(&self) -> Box<dyn MipBackend + Send + Sync> {
        match self {
            BackendKind::BranchAndBound => Box::new(BranchAndBound::new()),
            BackendKind::Gurobi => Box::new(GurobiBackend::default()),
        }
    }
}

/// Exact solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    pub backend: BackendKind,
    /// MTZ model, or cutting planes separated between solves
    pub formulation: FormulationKind,
    /// Time limit in seconds
    pub time_limit: f64,
    /// Branch-and-bound node limit (`None` = unlimited)
    pub node_limit: Option<u64>,
    /// MIP gap tolerance
    pub mip_gap: f64,
    /// Number of threads (0 = automatic)
    pub threads: i32,
    /// Enable verbose output
    pub verbose: bool,
    /// Seed the backend with a heuristic incumbent
    pub warm_start: bool,
    /// Largest instance the exact solver accepts
    pub max_nodes: usize,
}

impl Default for ExactConfig {
    fn default() -> Self {
        ExactConfig {
            backend: BackendKind::BranchAndBound,
            formulation: FormulationKind::Compact,
            time_limit: 60.0,
            node_limit: Some(200_000),
            mip_gap: 1e-6,
            threads: 0,
            verbose: false,
            warm_start: true,
            max_nodes: 12,
        }
    }
}

impl ExactConfig {
    pub fn limits(&self) -> SolveLimits {
        let time_limit = if self.time_limit.is_nan() || self.time_limit <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(self.time_limit).unwrap_or(Duration::MAX)
        };
        SolveLimits {
            time_limit,
            node_limit: self.node_limit,
            mip_gap: self.mip_gap.max(0.0),
            threads: self.threads,
            verbose: self.verbose,
        }
    }
}

/// How an exact run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExactStatus {
    Optimal,
    /// Budget exhausted; the solution is the best incumbent found
    SolverTimeout,
}

impl std::fmt::Display for ExactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExactStatus::Optimal => write!(f, "Optimal"),
            ExactStatus::SolverTimeout => write!(f, "SolverTimeout"),
        }
    }
}

/// Result of exact solving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactResult {
    /// Best solution found
    pub solution: Solution,
    pub evaluation: Evaluation,
    /// Whether optimality was proven
    pub optimal: bool,
    pub status: ExactStatus,
    /// Best lower bound reported by the backend
    pub lower_bound: Option<f64>,
    pub nodes_explored: u64,
    pub backend: String,
}

impl ExactResult {
    pub fn cost(&self) -> f64 {
        self.evaluation.cost
    }
}

/// Solve an instance exactly with the given configuration
pub fn solve(
    instance: &crate::instance::Instance,
    params: &crate::params::Parameters,
    config: &ExactConfig,
) -> RspResult<ExactResult> {
    ExactSolver::new(config.clone()).solve(instance, params)
}
