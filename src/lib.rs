//! Ring-Star Solver Library
//!
//! Exact and heuristic solvers for the Ring-Star Problem: choose P hubs, link
//! them into a cycle (the ring) and connect every other node to its nearest hub
//! (the star), minimizing
//!
//! ```text
//! alpha * ring_length + (1 - alpha) * star_cost
//! ```
//!
//! # Features
//!
//! - Exact MIP formulation with MTZ subtour elimination, solved by a built-in
//!   branch-and-bound over `minilp` relaxations or by Gurobi (`gurobi` feature)
//! - Construction heuristics (farthest-point, grid and random hub selection)
//! - Local search (2-opt on the ring, hub swaps) and simulated annealing
//! - Side-by-side comparison with optimality gaps, batch runs and CSV/JSON export
//!
//! # Example
//!
//! ```no_run
//! use ring_star_solver::config::EngineConfig;
//! use ring_star_solver::instance::Instance;
//! use ring_star_solver::params::Parameters;
//!
//! // Load instance
//! let instance = Instance::from_file("instance.tsp").unwrap();
//! let params = Parameters::new(5, 0.5);
//!
//! let record = ring_star_solver::compare(&instance, &params, &EngineConfig::default()).unwrap();
//! println!("{}", record);
//! ```

pub mod benchmark;
pub mod comparison;
pub mod config;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod exact;
pub mod heuristics;
pub mod instance;
pub mod params;
pub mod solution;

pub use comparison::{ComparisonEngine, ComparisonRecord};
pub use config::EngineConfig;
pub use error::{RspError, RspResult};
pub use exact::{ExactConfig, ExactResult};
pub use heuristics::HeuristicConfig;
pub use instance::Instance;
pub use params::Parameters;
pub use solution::Solution;

/// Solve exactly, or return the best incumbent found within the budget.
pub fn solve_exact(instance: &Instance, params: &Parameters, config: &ExactConfig) -> RspResult<ExactResult> {
    exact::solve(instance, params, config)
}

/// Construct and improve a solution heuristically. The seed is taken from
/// `config.seed` or drawn and recorded on the returned solution.
pub fn solve_heuristic(instance: &Instance, params: &Parameters, config: &HeuristicConfig) -> RspResult<Solution> {
    heuristics::HeuristicSolver::new(config.clone()).solve(instance, params)
}

/// Validate a solution and return its weighted cost.
pub fn evaluate(instance: &Instance, params: &Parameters, solution: &Solution) -> RspResult<f64> {
    evaluation::evaluate(instance, params, solution)
}

/// Run both solvers and compare them.
pub fn compare(instance: &Instance, params: &Parameters, config: &EngineConfig) -> RspResult<ComparisonRecord> {
    config.comparison_engine().compare(instance, params)
}
