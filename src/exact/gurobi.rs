//! Gurobi backend.
//!
//! Translates a [`MipModel`] variable by variable into a Gurobi model, passes
//! the warm start through the `Start` attribute and maps Gurobi's status codes
//! back onto [`MipStatus`].

use super::model::{MipModel, MipOutcome, MipStatus, Sense, VarDomain};
use super::{MipBackend, SolveLimits};
use crate::error::{RspError, RspResult};
use grb::prelude::*;

fn grb_err(context: &str) -> impl Fn(grb::Error) -> RspError + '_ {
    move |e| RspError::backend(format!("{}: {}", context, e))
}

/// Backend delegating to a local Gurobi installation
#[derive(Debug, Clone, Default)]
pub struct GurobiBackend;

impl MipBackend for GurobiBackend {
    fn name(&self) -> &str {
        "gurobi"
    }

    fn solve(&self, mip: &MipModel, limits: &SolveLimits, start: Option<&[f64]>) -> RspResult<MipOutcome> {
        let env = Env::new("").map_err(grb_err("Failed to create Gurobi environment"))?;
        let mut model = Model::with_env(&mip.name, env).map_err(grb_err("Failed to create model"))?;

        model
            .set_param(param::TimeLimit, limits.time_limit.as_secs_f64())
            .map_err(grb_err("Failed to set time limit"))?;
        model.set_param(param::MIPGap, limits.mip_gap).map_err(grb_err("Failed to set MIP gap"))?;
        model.set_param(param::Threads, limits.threads).map_err(grb_err("Failed to set threads"))?;
        if let Some(nodes) = limits.node_limit {
            model
                .set_param(param::NodeLimit, nodes as f64)
                .map_err(grb_err("Failed to set node limit"))?;
        }
        if !limits.verbose {
            model.set_param(param::OutputFlag, 0).map_err(grb_err("Failed to set output flag"))?;
        }

        let mut vars: Vec<Var> = Vec::with_capacity(mip.num_vars());
        for var in &mip.vars {
            let added = match var.domain {
                VarDomain::Binary => add_binvar!(model, name: &var.name, obj: var.objective),
                VarDomain::Integer { lower, upper } => {
                    add_intvar!(model, name: &var.name, obj: var.objective, bounds: lower..upper)
                }
                VarDomain::Continuous { lower, upper } => {
                    add_ctsvar!(model, name: &var.name, obj: var.objective, bounds: lower..upper)
                }
            }
            .map_err(grb_err("Failed to add variable"))?;
            vars.push(added);
        }
        model.update().map_err(grb_err("Failed to update model"))?;

        for constraint in &mip.constraints {
            let expr: Expr = constraint.expr.terms.iter().map(|&(v, c)| c * vars[v.0]).grb_sum();
            let rhs = constraint.rhs;
            let constr = match constraint.sense {
                Sense::Le => c!(expr <= rhs),
                Sense::Ge => c!(expr >= rhs),
                Sense::Eq => c!(expr == rhs),
            };
            model
                .add_constr(&constraint.name, constr)
                .map_err(grb_err("Failed to add constraint"))?;
        }

        // Warm start
        if let Some(values) = start {
            for (var, &value) in vars.iter().zip(values) {
                model
                    .set_obj_attr(attr::Start, var, value)
                    .map_err(grb_err("Failed to set warm start"))?;
            }
        }

        model.update().map_err(grb_err("Failed to update model before optimization"))?;
        model.optimize().map_err(grb_err("Optimization failed"))?;

        let status = model.status().map_err(grb_err("Failed to get status"))?;
        let solutions = model.get_attr(attr::SolCount).unwrap_or(0);
        let nodes_explored = model.get_attr(attr::NodeCount).unwrap_or(0.0) as u64;

        let status = match status {
            Status::Optimal => MipStatus::Optimal,
            Status::Infeasible | Status::InfOrUnbd => MipStatus::Infeasible,
            Status::TimeLimit | Status::NodeLimit | Status::SolutionLimit | Status::Interrupted => {
                if solutions > 0 {
                    MipStatus::Feasible
                } else {
                    MipStatus::NoSolution
                }
            }
            other => return Err(RspError::backend(format!("Gurobi stopped with status {:?}", other))),
        };

        let (values, objective) = if matches!(status, MipStatus::Optimal | MipStatus::Feasible) {
            let values = model
                .get_obj_attr_batch(attr::X, vars.iter().copied())
                .map_err(grb_err("Failed to read solution"))?;
            let objective = model.get_attr(attr::ObjVal).map_err(grb_err("Failed to read objective"))?;
            (Some(values), Some(objective))
        } else {
            (None, None)
        };
        let bound = model.get_attr(attr::ObjBound).unwrap_or(f64::NEG_INFINITY);

        Ok(MipOutcome { status, values, objective, bound, nodes_explored })
    }
}
