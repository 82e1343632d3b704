//! Exact-versus-heuristic comparison of one instance.
//!
//! The exact solver runs first. Its recoverable failures (no solution within
//! budget, proven infeasibility, size ceiling, unavailable backend) are kept in
//! the record as a [`ExactOutcome::NotFound`] or [`ExactOutcome::Skipped`]
//! marker; everything else propagates.

use crate::error::{RspError, RspResult};
use crate::evaluation::{evaluate_detailed, Evaluation};
use crate::exact::{ExactConfig, ExactResult, ExactSolver, ExactStatus};
use crate::heuristics::{HeuristicConfig, HeuristicSolver};
use crate::instance::Instance;
use crate::params::Parameters;
use crate::solution::Solution;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// What the exact side of a comparison produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExactOutcome {
    Solved(ExactResult),
    /// The solver ran but produced no solution
    NotFound { reason: String },
    /// The solver was not run on this instance
    Skipped { reason: String },
}

impl ExactOutcome {
    fn from_failure(error: &RspError) -> Self {
        let reason = error.to_string();
        match error {
            RspError::TooLarge { .. } | RspError::Backend(_) => ExactOutcome::Skipped { reason },
            _ => ExactOutcome::NotFound { reason },
        }
    }

    pub fn result(&self) -> Option<&ExactResult> {
        match self {
            ExactOutcome::Solved(result) => Some(result),
            _ => None,
        }
    }

    /// Short label for tables: `Optimal`, `SolverTimeout`, `NotFound` or `Skipped`
    pub fn label(&self) -> String {
        match self {
            ExactOutcome::Solved(result) => result.status.to_string(),
            ExactOutcome::NotFound { .. } => "NotFound".to_string(),
            ExactOutcome::Skipped { .. } => "Skipped".to_string(),
        }
    }
}

/// Trust level of a reported gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapBasis {
    /// Measured against a proven optimum
    Proven,
    /// Measured against an exact incumbent that is not proven optimal
    UnprovenBound,
    /// No exact cost to measure against
    Unavailable,
}

/// Relative gap `(heuristic - exact) / exact`. A zero exact cost only admits a zero heuristic cost.
pub fn relative_gap(heuristic: f64, exact: f64) -> Option<f64> {
    if exact == 0.0 {
        (heuristic == 0.0).then_some(0.0)
    } else {
        Some((heuristic - exact) / exact)
    }
}

/// Outcome of comparing both solvers on one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub instance: String,
    pub dimension: usize,
    pub params: Parameters,
    pub exact: ExactOutcome,
    pub heuristic: Solution,
    pub heuristic_evaluation: Evaluation,
    pub gap: Option<f64>,
    pub gap_basis: GapBasis,
    /// Wall-clock time of the exact run, failed runs included
    pub exact_time: f64,
    pub heuristic_time: f64,
    pub created_at: DateTime<Utc>,
}

impl ComparisonRecord {
    pub fn exact_cost(&self) -> Option<f64> {
        self.exact.result().map(ExactResult::cost)
    }

    pub fn heuristic_cost(&self) -> f64 {
        self.heuristic_evaluation.cost
    }

    pub fn lower_bound(&self) -> Option<f64> {
        self.exact.result().and_then(|r| r.lower_bound)
    }

    pub fn is_proven_optimal(&self) -> bool {
        self.gap_basis == GapBasis::Proven
    }

    pub fn to_row(&self) -> ComparisonRow {
        let exact = self.exact.result();
        ComparisonRow {
            instance: self.instance.clone(),
            dimension: self.dimension,
            hubs: self.params.hubs,
            alpha: self.params.alpha,
            exact_status: self.exact.label(),
            exact_cost: self.exact_cost(),
            exact_ring_length: exact.map(|r| r.evaluation.ring_length),
            exact_star_cost: exact.map(|r| r.evaluation.star_cost),
            exact_time: self.exact_time,
            lower_bound: self.lower_bound(),
            heuristic_cost: self.heuristic_cost(),
            heuristic_ring_length: self.heuristic_evaluation.ring_length,
            heuristic_star_cost: self.heuristic_evaluation.star_cost,
            heuristic_time: self.heuristic_time,
            heuristic_seed: self.heuristic.seed,
            gap: self.gap,
            gap_basis: format!("{:?}", self.gap_basis),
        }
    }
}

impl std::fmt::Display for ComparisonRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} (n={}, P={}, alpha={})",
            self.instance, self.dimension, self.params.hubs, self.params.alpha
        )?;
        match &self.exact {
            ExactOutcome::Solved(r) => writeln!(
                f,
                "  Exact:     {:>12.4}  [{}] ring {:.4}, star {:.4}, {:.3}s",
                r.cost(),
                r.status,
                r.evaluation.ring_length,
                r.evaluation.star_cost,
                self.exact_time
            )?,
            ExactOutcome::NotFound { reason } => writeln!(f, "  Exact:     not found ({})", reason)?,
            ExactOutcome::Skipped { reason } => writeln!(f, "  Exact:     skipped ({})", reason)?,
        }
        writeln!(
            f,
            "  Heuristic: {:>12.4}  ring {:.4}, star {:.4}, {:.3}s",
            self.heuristic_cost(),
            self.heuristic_evaluation.ring_length,
            self.heuristic_evaluation.star_cost,
            self.heuristic_time
        )?;
        match self.gap {
            Some(gap) => writeln!(f, "  Gap:       {:.2}% ({:?})", gap * 100.0, self.gap_basis),
            None => writeln!(f, "  Gap:       - ({:?})", self.gap_basis),
        }
    }
}

/// Flat view of a [`ComparisonRecord`] for CSV export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub instance: String,
    pub dimension: usize,
    pub hubs: usize,
    pub alpha: f64,
    pub exact_status: String,
    pub exact_cost: Option<f64>,
    pub exact_ring_length: Option<f64>,
    pub exact_star_cost: Option<f64>,
    pub exact_time: f64,
    pub lower_bound: Option<f64>,
    pub heuristic_cost: f64,
    pub heuristic_ring_length: f64,
    pub heuristic_star_cost: f64,
    pub heuristic_time: f64,
    pub heuristic_seed: Option<u64>,
    pub gap: Option<f64>,
    pub gap_basis: String,
}

/// Runs both solvers on an instance and assembles the record
pub struct ComparisonEngine {
    exact: ExactSolver,
    heuristic: HeuristicSolver,
}

impl ComparisonEngine {
    pub fn new(exact: ExactConfig, heuristic: HeuristicConfig) -> Self {
        ComparisonEngine { exact: ExactSolver::new(exact), heuristic: HeuristicSolver::new(heuristic) }
    }

    pub fn compare(&self, instance: &Instance, params: &Parameters) -> RspResult<ComparisonRecord> {
        params.validate(instance)?;

        let start = Instant::now();
        let exact = match self.exact.solve(instance, params) {
            Ok(result) => ExactOutcome::Solved(result),
            Err(e) if e.is_recoverable_exact_failure() => {
                log::warn!("Exact solver gave no solution on {}: {}", instance.name, e);
                ExactOutcome::from_failure(&e)
            }
            Err(e) => return Err(e),
        };
        let exact_time = start.elapsed().as_secs_f64();

        let start = Instant::now();
        let heuristic = self.heuristic.solve(instance, params)?;
        let heuristic_time = start.elapsed().as_secs_f64();
        let heuristic_evaluation = evaluate_detailed(instance, params, &heuristic)?;

        let (gap, gap_basis) = match exact.result() {
            Some(result) => {
                let basis = match result.status {
                    ExactStatus::Optimal => GapBasis::Proven,
                    ExactStatus::SolverTimeout => GapBasis::UnprovenBound,
                };
                match relative_gap(heuristic_evaluation.cost, result.cost()) {
                    Some(gap) => (Some(gap), basis),
                    None => (None, GapBasis::Unavailable),
                }
            }
            None => (None, GapBasis::Unavailable),
        };

        Ok(ComparisonRecord {
            instance: instance.name.clone(),
            dimension: instance.dimension,
            params: *params,
            exact,
            heuristic,
            heuristic_evaluation,
            gap,
            gap_basis,
            exact_time,
            heuristic_time,
            created_at: Utc::now(),
        })
    }
}

pub fn export_records_csv<P: AsRef<Path>>(records: &[ComparisonRecord], path: P) -> RspResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);

    for record in records {
        writer.serialize(record.to_row())?;
    }

    writer.flush()?;
    Ok(())
}

pub fn export_records_json<P: AsRef<Path>>(records: &[ComparisonRecord], path: P) -> RspResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Instance {
        Instance::from_coords("sq", &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 5.0)]).unwrap()
    }

    fn engine(exact: ExactConfig) -> ComparisonEngine {
        ComparisonEngine::new(exact, HeuristicConfig { seed: Some(9), ..Default::default() })
    }

    #[test]
    fn test_relative_gap() {
        assert_eq!(relative_gap(11.0, 10.0), Some(0.1));
        assert_eq!(relative_gap(0.0, 0.0), Some(0.0));
        assert_eq!(relative_gap(1.0, 0.0), None);
    }

    #[test]
    fn test_proven_comparison() {
        let record = engine(ExactConfig::default()).compare(&square(), &Parameters::new(4, 0.5)).unwrap();
        assert_eq!(record.gap_basis, GapBasis::Proven);
        assert!(record.is_proven_optimal());
        let gap = record.gap.unwrap();
        assert!(gap >= -1e-9);
        assert!(record.heuristic_cost() >= record.exact_cost().unwrap() - 1e-9);

        let row = record.to_row();
        assert_eq!(row.exact_status, "Optimal");
        assert_eq!(row.heuristic_seed, Some(9));
    }

    #[test]
    fn test_too_large_is_skipped() {
        let config = ExactConfig { max_nodes: 4, ..Default::default() };
        let record = engine(config).compare(&square(), &Parameters::new(3, 0.5)).unwrap();
        assert!(matches!(record.exact, ExactOutcome::Skipped { .. }));
        assert_eq!(record.gap, None);
        assert_eq!(record.gap_basis, GapBasis::Unavailable);
        assert_eq!(record.to_row().exact_status, "Skipped");
    }

    #[test]
    fn test_timeout_without_incumbent_is_not_found() {
        let config = ExactConfig { time_limit: 0.0, warm_start: false, ..Default::default() };
        let record = engine(config).compare(&square(), &Parameters::new(3, 0.5)).unwrap();
        assert!(matches!(record.exact, ExactOutcome::NotFound { .. }));
        assert_eq!(record.gap_basis, GapBasis::Unavailable);
    }

    #[test]
    fn test_invalid_parameters_propagate() {
        let err = engine(ExactConfig::default()).compare(&square(), &Parameters::new(2, 1.5)).unwrap_err();
        assert!(matches!(err, RspError::InvalidInstance(_)));
    }

    #[test]
    fn test_record_serializes() {
        let config = ExactConfig { max_nodes: 2, ..Default::default() };
        let record = engine(config).compare(&square(), &Parameters::new(2, 0.5)).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"outcome\":\"skipped\""));
        let back: ComparisonRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.heuristic.ring, record.heuristic.ring);
    }
}
