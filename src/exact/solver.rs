use super::formulation::RingStarFormulation;
use super::{ExactConfig, ExactResult, ExactStatus, MipStatus, SolveLimits};
use crate::error::{RspError, RspResult};
use crate::evaluation::evaluate_detailed;
use crate::heuristics::{HeuristicConfig, HeuristicSolver};
use crate::instance::Instance;
use crate::params::Parameters;
use std::time::Instant;

/// Seed of the heuristic run that provides the MIP start
const WARM_START_SEED: u64 = 0;

/// Exact Ring-Star solver: builds the MIP formulation and hands it to the
/// configured backend
pub struct ExactSolver {
    config: ExactConfig,
}

impl ExactSolver {
    pub fn new(config: ExactConfig) -> Self {
        ExactSolver { config }
    }

    pub fn config(&self) -> &ExactConfig {
        &self.config
    }

    /// Solve to optimality, or return the best incumbent once the budget runs out
    pub fn solve(&self, instance: &Instance, params: &Parameters) -> RspResult<ExactResult> {
        params.validate(instance)?;
        if instance.dimension > self.config.max_nodes {
            return Err(RspError::TooLarge { nodes: instance.dimension, limit: self.config.max_nodes });
        }

        let start = Instant::now();
        let backend = self.config.backend.create();
        let mut formulation = RingStarFormulation::build_with(instance, params, self.config.formulation);
        log::info!(
            "Exact solve of {} (n={}, P={}, alpha={}) with {} ({:?}): {} variables, {} constraints",
            instance.name,
            instance.dimension,
            params.hubs,
            params.alpha,
            backend.name(),
            formulation.kind(),
            formulation.model.num_vars(),
            formulation.model.constraints.len()
        );

        let warm_start = if self.config.warm_start {
            let heuristic = HeuristicSolver::new(HeuristicConfig { seed: Some(WARM_START_SEED), ..Default::default() });
            let incumbent = heuristic.solve(instance, params)?;
            log::debug!("Warm start from {} incumbent", incumbent.algorithm);
            Some(formulation.start_values(&incumbent))
        } else {
            None
        };

        // Re-solve until the optimum has no subtours; the compact model never yields cuts
        let limits = self.config.limits();
        let mut nodes_explored = 0;
        let mut rounds = 0;
        let outcome = loop {
            let round_limits = SolveLimits { time_limit: limits.time_limit.saturating_sub(start.elapsed()), ..limits.clone() };
            let outcome = backend.solve(&formulation.model, &round_limits, warm_start.as_deref())?;
            nodes_explored += outcome.nodes_explored;
            rounds += 1;

            let Some(values) = outcome.values.as_ref().filter(|_| outcome.status == MipStatus::Optimal) else {
                break outcome;
            };
            let components = formulation.components(values);
            let added = formulation.add_subtour_cuts(&components);
            if added == 0 {
                break outcome;
            }
            log::debug!("Round {}: {} subtours, {} cuts added ({} in total)", rounds, components.len(), added, formulation.cuts());
        };

        let (optimal, status, values) = match outcome.status {
            MipStatus::Optimal => (true, ExactStatus::Optimal, outcome.values),
            MipStatus::Feasible => {
                // an incumbent of the cut model may still contain subtours
                let values = outcome
                    .values
                    .filter(|v| formulation.components(v).len() == 1)
                    .or(warm_start);
                (false, ExactStatus::SolverTimeout, values)
            }
            MipStatus::Infeasible => {
                return Err(RspError::infeasible(format!(
                    "no ring of {} hubs exists for {}",
                    params.hubs, instance.name
                )))
            }
            MipStatus::NoSolution => {
                log::warn!("Exact budget exhausted on {} without an incumbent", instance.name);
                return Err(RspError::SolverTimeout);
            }
        };

        let values = values.ok_or(RspError::SolverTimeout)?;
        let mut solution = formulation.extract(&values, &format!("Exact-{}", backend.name()))?;
        solution.canonicalize();
        solution.computation_time = start.elapsed().as_secs_f64();
        solution.iterations = Some(nodes_explored as usize);

        let evaluation = evaluate_detailed(instance, params, &solution)?;
        let lower_bound = outcome.bound.is_finite().then(|| outcome.bound.min(evaluation.cost));

        if !optimal {
            log::warn!(
                "Exact budget exhausted on {}: incumbent {:.4}, bound {:?}",
                instance.name,
                evaluation.cost,
                lower_bound
            );
        } else {
            log::info!(
                "Exact optimum for {}: {:.4} ({} nodes, {} rounds, {} cuts)",
                instance.name,
                evaluation.cost,
                nodes_explored,
                rounds,
                formulation.cuts()
            );
        }

        Ok(ExactResult {
            solution,
            evaluation,
            optimal,
            status,
            lower_bound,
            nodes_explored,
            backend: backend.name().to_string(),
        })
    }
}
