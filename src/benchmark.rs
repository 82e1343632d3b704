//! Batch comparisons over many instances.
//!
//! Provides tools for running the comparison engine on a directory of
//! instances, collecting statistics and exporting the results.

use crate::comparison::{export_records_csv, export_records_json, ComparisonEngine, ComparisonRecord};
use crate::distance::Metric;
use crate::error::RspResult;
use crate::instance::Instance;
use crate::params::Parameters;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// Hub count, either fixed or relative to the instance size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubCount {
    Absolute(usize),
    /// Fraction of the node count, rounded and clamped to `[2, n]`
    Ratio(f64),
}

impl HubCount {
    pub fn resolve(&self, dimension: usize) -> usize {
        match *self {
            HubCount::Absolute(p) => p,
            HubCount::Ratio(ratio) => Parameters::hubs_from_ratio(dimension, ratio),
        }
    }
}

/// Batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub hubs: HubCount,
    pub alpha: f64,
    pub depot: Option<usize>,
    /// Run instances in parallel
    pub parallel: bool,
    /// Show a progress bar
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            hubs: HubCount::Absolute(5),
            alpha: 0.5,
            depot: None,
            parallel: false,
            show_progress: false,
        }
    }
}

/// An instance the batch could not compare
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub instance: String,
    pub error: String,
}

/// Aggregated statistics for one solver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverStatistics {
    /// Solver name
    pub solver: String,
    /// Number of instances with a solution
    pub solved: usize,
    pub mean_cost: f64,
    pub std_cost: f64,
    pub mean_time: f64,
    /// Mean gap to the exact cost (heuristic only)
    pub mean_gap: Option<f64>,
    /// Number of proven optima (exact only)
    pub proven_optima: usize,
}

impl SolverStatistics {
    fn from_samples(solver: &str, costs: &[f64], times: &[f64], gaps: &[f64], proven_optima: usize) -> Self {
        let mean = |values: &[f64]| if values.is_empty() { 0.0 } else { values.iter().mean() };
        SolverStatistics {
            solver: solver.to_string(),
            solved: costs.len(),
            mean_cost: mean(costs),
            std_cost: if costs.len() < 2 { 0.0 } else { costs.iter().std_dev() },
            mean_time: mean(times),
            mean_gap: (!gaps.is_empty()).then(|| gaps.iter().mean()),
            proven_optima,
        }
    }
}

/// Everything a batch run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub records: Vec<ComparisonRecord>,
    pub failures: Vec<BatchFailure>,
    pub started_at: DateTime<Utc>,
    /// Wall-clock time of the whole batch in seconds
    pub total_time: f64,
}

impl BatchReport {
    /// Statistics for the exact and the heuristic solver
    pub fn statistics(&self) -> Vec<SolverStatistics> {
        let solved: Vec<_> = self.records.iter().filter_map(|r| r.exact.result().map(|e| (r, e))).collect();
        let exact_costs: Vec<f64> = solved.iter().map(|(_, e)| e.cost()).collect();
        let exact_times: Vec<f64> = solved.iter().map(|(r, _)| r.exact_time).collect();
        let proven = solved.iter().filter(|(_, e)| e.optimal).count();

        let heuristic_costs: Vec<f64> = self.records.iter().map(|r| r.heuristic_cost()).collect();
        let heuristic_times: Vec<f64> = self.records.iter().map(|r| r.heuristic_time).collect();
        let gaps: Vec<f64> = self.records.iter().filter_map(|r| r.gap).collect();

        vec![
            SolverStatistics::from_samples("Exact", &exact_costs, &exact_times, &[], proven),
            SolverStatistics::from_samples("Heuristic", &heuristic_costs, &heuristic_times, &gaps, 0),
        ]
    }

    /// Generate summary report
    pub fn render(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("     Ring-Star Comparison Report\n");
        report.push_str("========================================\n\n");
        report.push_str(&format!(
            "Started {} | {} compared, {} failed | {:.2}s\n\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.records.len(),
            self.failures.len(),
            self.total_time
        ));

        report.push_str("Per-instance results:\n");
        report.push_str("-".repeat(96).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>6} {:>4} {:>6} {:>14} {:>12} {:>12} {:>9} {:>8}\n",
            "Instance", "n", "P", "alpha", "Exact", "Exact Cost", "Heur Cost", "Gap%", "Basis"
        ));
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        for record in &self.records {
            let exact_cost = record
                .exact_cost()
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "-".to_string());
            let gap = record
                .gap
                .map(|g| format!("{:.2}%", g * 100.0))
                .unwrap_or_else(|| "-".to_string());
            report.push_str(&format!(
                "{:<20} {:>6} {:>4} {:>6.2} {:>14} {:>12} {:>12.2} {:>9} {:>8}\n",
                record.instance,
                record.dimension,
                record.params.hubs,
                record.params.alpha,
                record.exact.label(),
                exact_cost,
                record.heuristic_cost(),
                gap,
                format!("{:?}", record.gap_basis)
            ));
        }
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        report.push_str("\nSolver summary:\n");
        for stat in self.statistics() {
            let gap = stat
                .mean_gap
                .map(|g| format!("{:.2}%", g * 100.0))
                .unwrap_or_else(|| "-".to_string());
            report.push_str(&format!(
                "  {:<10} solved {:>3}  mean {:>12.2}  std {:>10.2}  time {:>8.4}s  gap {:>8}  optimal {}\n",
                stat.solver, stat.solved, stat.mean_cost, stat.std_cost, stat.mean_time, gap, stat.proven_optima
            ));
        }

        if !self.failures.is_empty() {
            report.push_str("\nFailures:\n");
            for failure in &self.failures {
                report.push_str(&format!("  {}: {}\n", failure.instance, failure.error));
            }
        }

        report
    }

    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> RspResult<()> {
        export_records_csv(&self.records, path)
    }

    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> RspResult<()> {
        export_records_json(&self.records, path)
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> RspResult<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Applies a [`ComparisonEngine`] to a list of instances
pub struct BatchRunner {
    engine: ComparisonEngine,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(engine: ComparisonEngine, config: BatchConfig) -> Self {
        BatchRunner { engine, config }
    }

    fn compare_one(&self, instance: &Instance) -> Result<ComparisonRecord, BatchFailure> {
        let mut params = Parameters::new(self.config.hubs.resolve(instance.dimension), self.config.alpha);
        params.depot = self.config.depot;

        self.engine.compare(instance, &params).map_err(|e| {
            log::warn!("Comparison failed on {}: {}", instance.name, e);
            BatchFailure { instance: instance.name.clone(), error: e.to_string() }
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }

    /// Compare every instance; failures are collected, never abort the batch.
    pub fn run(&self, instances: &[Instance]) -> BatchReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let bar = self.progress_bar(instances.len());

        let step = |instance: &Instance| {
            bar.set_message(instance.name.clone());
            let outcome = self.compare_one(instance);
            bar.inc(1);
            outcome
        };

        let outcomes: Vec<Result<ComparisonRecord, BatchFailure>> = if self.config.parallel {
            instances.par_iter().map(step).collect()
        } else {
            instances.iter().map(step).collect()
        };
        bar.finish_and_clear();

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(failure) => failures.push(failure),
            }
        }

        log::info!(
            "Batch finished: {} compared, {} failed in {:.2}s",
            records.len(),
            failures.len(),
            start.elapsed().as_secs_f64()
        );

        BatchReport { records, failures, started_at, total_time: start.elapsed().as_secs_f64() }
    }
}

/// Load every `*.tsp` file of a directory, sorted by dimension, optionally
/// keeping only sizes within `[min_size, max_size]`. Unreadable files are logged and skipped.
/// With `metric` set to `None` each file uses its declared `EDGE_WEIGHT_TYPE`.
pub fn load_instances_from_dir<P: AsRef<Path>>(
    dir: P,
    metric: Option<Metric>,
    min_size: Option<usize>,
    max_size: Option<usize>,
) -> RspResult<Vec<Instance>> {
    let mut instances = Vec::new();

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e == "tsp").unwrap_or(false) {
            match Instance::load(&path, metric) {
                Ok(instance) => instances.push(instance),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
    }

    instances.retain(|i| min_size.map_or(true, |min| i.dimension >= min) && max_size.map_or(true, |max| i.dimension <= max));
    // Sort by dimension
    instances.sort_by(|a, b| a.dimension.cmp(&b.dimension).then_with(|| a.name.cmp(&b.name)));

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::ExactConfig;
    use crate::heuristics::HeuristicConfig;

    fn engine() -> ComparisonEngine {
        ComparisonEngine::new(ExactConfig::default(), HeuristicConfig { seed: Some(1), ..Default::default() })
    }

    fn pentagon(name: &str) -> Instance {
        let coords: Vec<(f64, f64)> = (0..5)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 5.0;
                (10.0 * a.cos(), 10.0 * a.sin())
            })
            .collect();
        Instance::from_coords(name, &coords).unwrap()
    }

    #[test]
    fn test_hub_count_resolution() {
        assert_eq!(HubCount::Absolute(4).resolve(10), 4);
        assert_eq!(HubCount::Ratio(0.25).resolve(10), 3);
        assert_eq!(HubCount::Ratio(0.01).resolve(10), 2);
    }

    #[test]
    fn test_batch_collects_failures() {
        let config = BatchConfig { hubs: HubCount::Absolute(4), ..Default::default() };
        let runner = BatchRunner::new(engine(), config);
        let tiny = Instance::from_coords("tiny", &[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]).unwrap();
        let report = runner.run(&[pentagon("a"), tiny, pentagon("b")]);

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].instance, "tiny");

        let stats = report.statistics();
        assert_eq!(stats[0].solved, 2);
        assert_eq!(stats[0].proven_optima, 2);
        assert!(stats[0].std_cost.abs() < 1e-9);
        assert!(report.render().contains("tiny"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let instances = vec![pentagon("a"), pentagon("b"), pentagon("c")];
        let seq = BatchRunner::new(engine(), BatchConfig { hubs: HubCount::Ratio(0.6), ..Default::default() }).run(&instances);
        let par = BatchRunner::new(engine(), BatchConfig { hubs: HubCount::Ratio(0.6), parallel: true, ..Default::default() })
            .run(&instances);
        let names = |r: &BatchReport| r.records.iter().map(|c| c.instance.clone()).collect::<Vec<_>>();
        assert_eq!(names(&seq), names(&par));
        for (a, b) in seq.records.iter().zip(&par.records) {
            assert_eq!(a.heuristic.ring, b.heuristic.ring);
        }
    }
}
