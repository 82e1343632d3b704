//! Ring-Star Solver - Command Line Interface
//!
//! Solve, compare and benchmark exact and heuristic Ring-Star solutions.

use clap::{Parser, Subcommand, ValueEnum};
use ring_star_solver::benchmark::{load_instances_from_dir, HubCount};
use ring_star_solver::comparison::{export_records_csv, export_records_json};
use ring_star_solver::config::EngineConfig;
use ring_star_solver::distance::Metric;
use ring_star_solver::evaluation::evaluate_detailed;
use ring_star_solver::exact::FormulationKind;
use ring_star_solver::heuristics::AnnealingConfig;
use ring_star_solver::instance::Instance;
use ring_star_solver::params::Parameters;
use ring_star_solver::{solve_exact, solve_heuristic, RspResult};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ring-star")]
#[command(version = "1.0")]
#[command(about = "Exact and heuristic solvers for the Ring-Star Problem")]
struct Cli {
    /// JSON configuration file (partial files are completed with defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Distance metric ("declared" follows each file's EDGE_WEIGHT_TYPE)
    #[arg(long, value_enum, default_value = "euclidean", global = true)]
    metric: MetricArg,

    /// Subtour elimination used by the exact solver
    #[arg(long, value_enum, global = true)]
    formulation: Option<FormulationArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance with one solver
    Solve {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Number of hubs (P)
        #[arg(short = 'p', long)]
        hubs: usize,

        /// Weight of the ring length
        #[arg(short, long, default_value = "0.5")]
        alpha: f64,

        /// Node index (0-based) that must be a hub
        #[arg(long)]
        depot: Option<usize>,

        #[arg(short, long, value_enum, default_value = "heuristic")]
        method: Method,

        /// Random seed for the heuristic
        #[arg(short, long)]
        seed: Option<u64>,

        /// Time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Add simulated annealing after the local search
        #[arg(long)]
        annealing: bool,

        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare the exact and heuristic solvers on an instance
    Compare {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(short = 'p', long)]
        hubs: usize,

        #[arg(short, long, default_value = "0.5")]
        alpha: f64,

        #[arg(long)]
        depot: Option<usize>,

        #[arg(short, long)]
        seed: Option<u64>,

        /// Exact solver time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Output file (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare both solvers on every instance of a directory
    Batch {
        /// Directory containing .tsp files
        #[arg(short, long)]
        dir: PathBuf,

        /// Fixed number of hubs
        #[arg(short = 'p', long, conflicts_with = "hub_ratio")]
        hubs: Option<usize>,

        /// Number of hubs as a fraction of the instance size
        #[arg(long)]
        hub_ratio: Option<f64>,

        #[arg(short, long)]
        alpha: Option<f64>,

        /// Minimum instance size
        #[arg(long)]
        min_size: Option<usize>,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,

        /// Run instances in parallel
        #[arg(long)]
        parallel: bool,

        /// Output directory
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Method {
    /// Exact MIP solver
    Exact,
    /// Multi-start construction + local search
    Heuristic,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum MetricArg {
    /// Plain Euclidean distance
    Euclidean,
    /// TSPLIB EUC_2D (rounded to the nearest integer)
    Rounded,
    /// L1 distance
    Manhattan,
    /// Metric named by the file's EDGE_WEIGHT_TYPE, Euclidean when unsupported
    Declared,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum FormulationArg {
    /// MTZ ordering constraints
    Compact,
    /// Subtour cuts added between solves
    CuttingPlane,
}

impl MetricArg {
    /// Fixed metric, or `None` to use the one each file declares
    fn metric(self) -> Option<Metric> {
        match self {
            MetricArg::Euclidean => Some(Metric::Euclidean),
            MetricArg::Rounded => Some(Metric::RoundedEuclidean),
            MetricArg::Manhattan => Some(Metric::Manhattan),
            MetricArg::Declared => None,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> RspResult<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    match cli.formulation {
        Some(FormulationArg::Compact) => config.exact.formulation = FormulationKind::Compact,
        Some(FormulationArg::CuttingPlane) => config.exact.formulation = FormulationKind::CuttingPlane,
        None => {}
    }
    let metric = cli.metric.metric();

    match cli.command {
        Commands::Solve { instance, hubs, alpha, depot, method, seed, time_limit, annealing, output } => {
            let params = Parameters { hubs, alpha, depot };
            solve_instance(&instance, metric, params, method, seed, time_limit, annealing, output, config)
        }

        Commands::Compare { instance, hubs, alpha, depot, seed, time_limit, output } => {
            let params = Parameters { hubs, alpha, depot };
            compare_instance(&instance, metric, params, seed, time_limit, output, config)
        }

        Commands::Batch { dir, hubs, hub_ratio, alpha, min_size, max_size, parallel, output } => {
            let mut config = config;
            if let Some(p) = hubs {
                config.batch.hubs = HubCount::Absolute(p);
            }
            if let Some(ratio) = hub_ratio {
                config.batch.hubs = HubCount::Ratio(ratio);
            }
            if let Some(alpha) = alpha {
                config.batch.alpha = alpha;
            }
            config.batch.parallel |= parallel;
            config.batch.show_progress = true;
            run_batch(&dir, metric, min_size, max_size, &output, config)
        }

        Commands::Analyze { instance } => analyze_instance(&instance, metric),
    }
}

fn load_instance(path: &Path, metric: Option<Metric>) -> RspResult<Instance> {
    println!("Loading instance from {:?}...", path);
    Instance::load(path, metric)
}

#[allow(clippy::too_many_arguments)]
fn solve_instance(
    path: &Path,
    metric: Option<Metric>,
    params: Parameters,
    method: Method,
    seed: Option<u64>,
    time_limit: Option<f64>,
    annealing: bool,
    output: Option<PathBuf>,
    mut config: EngineConfig,
) -> RspResult<()> {
    let instance = load_instance(path, metric)?;
    if seed.is_some() {
        config.heuristic.seed = seed;
    }
    if annealing && config.heuristic.annealing.is_none() {
        config.heuristic.annealing = Some(AnnealingConfig::default());
    }

    println!("Solving {} (n={}, P={}, alpha={}) with {:?}...", instance.name, instance.dimension, params.hubs, params.alpha, method);

    let solution = match method {
        Method::Exact => {
            if let Some(t) = time_limit {
                config.exact.time_limit = t;
            }
            let result = solve_exact(&instance, &params, &config.exact)?;
            println!("Status: {} ({} nodes, backend {})", result.status, result.nodes_explored, result.backend);
            if let Some(bound) = result.lower_bound {
                println!("Lower bound: {:.4}", bound);
            }
            result.solution
        }
        Method::Heuristic => {
            if time_limit.is_some() {
                config.heuristic.time_limit = time_limit;
            }
            solve_heuristic(&instance, &params, &config.heuristic)?
        }
    };

    let evaluation = evaluate_detailed(&instance, &params, &solution)?;
    println!("\n{}", solution);
    println!("Ring length: {:.4}", evaluation.ring_length);
    println!("Star cost:   {:.4}", evaluation.star_cost);
    println!("Cost:        {:.4}", evaluation.cost);

    if let Some(path) = output {
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &solution)?;
        println!("\nSolution saved to {:?}", path);
    }
    Ok(())
}

fn compare_instance(
    path: &Path,
    metric: Option<Metric>,
    params: Parameters,
    seed: Option<u64>,
    time_limit: Option<f64>,
    output: Option<PathBuf>,
    mut config: EngineConfig,
) -> RspResult<()> {
    let instance = load_instance(path, metric)?;
    if seed.is_some() {
        config.heuristic.seed = seed;
    }
    if let Some(t) = time_limit {
        config.exact.time_limit = t;
    }

    let record = config.comparison_engine().compare(&instance, &params)?;
    println!("\n{}", record);

    if let Some(path) = output {
        let records = [record];
        if path.extension().map(|e| e == "csv").unwrap_or(false) {
            export_records_csv(&records, &path)?;
        } else {
            export_records_json(&records, &path)?;
        }
        println!("Comparison saved to {:?}", path);
    }
    Ok(())
}

fn run_batch(
    dir: &Path,
    metric: Option<Metric>,
    min_size: Option<usize>,
    max_size: Option<usize>,
    output: &Path,
    config: EngineConfig,
) -> RspResult<()> {
    println!("Loading instances from {:?}...", dir);

    let instances = load_instances_from_dir(dir, metric, min_size, max_size)?;

    println!("Found {} instances", instances.len());
    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(());
    }

    std::fs::create_dir_all(output)?;
    let report = config.batch_runner().run(&instances);

    let results_path = output.join("comparisons.csv");
    report.export_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let json_path = output.join("comparisons.json");
    report.export_json(&json_path)?;

    let stats_path = output.join("statistics.csv");
    report.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let text = report.render();
    println!("\n{}", text);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &text)?;
    println!("Report saved to {:?}", report_path);
    Ok(())
}

fn analyze_instance(path: &Path, metric: Option<Metric>) -> RspResult<()> {
    let instance = load_instance(path, metric)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    println!("\nQuick heuristic estimates (alpha = 0.5):");
    let config = EngineConfig::default();
    let n = instance.dimension;
    for ratio in [0.1, 0.25, 0.5] {
        let params = Parameters::new(Parameters::hubs_from_ratio(n, ratio), 0.5);
        let heuristic = ring_star_solver::HeuristicConfig { seed: Some(0), ..config.heuristic.clone() };
        let solution = solve_heuristic(&instance, &params, &heuristic)?;
        let evaluation = evaluate_detailed(&instance, &params, &solution)?;
        println!(
            "  P={:<4} cost {:>12.2}  ring {:>12.2}  star {:>12.2}  ({:.3}s)",
            params.hubs, evaluation.cost, evaluation.ring_length, evaluation.star_cost, solution.computation_time
        );
    }
    Ok(())
}
