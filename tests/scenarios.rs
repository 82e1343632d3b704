use ring_star_solver::benchmark::{load_instances_from_dir, BatchConfig, BatchRunner, HubCount};
use ring_star_solver::comparison::{ComparisonEngine, ExactOutcome, GapBasis};
use ring_star_solver::distance::Metric;
use ring_star_solver::exact::ExactStatus;
use ring_star_solver::{
    evaluate, solve_exact, solve_heuristic, ExactConfig, HeuristicConfig, Instance, Parameters, Solution,
};

const EPS: f64 = 1e-6;

fn square_with_center() -> Instance {
    Instance::from_coords("square", &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 5.0)]).unwrap()
}

fn hexagon() -> Instance {
    Instance::from_coords(
        "hexagon",
        &[(0.0, 0.0), (4.0, 1.0), (8.0, 0.0), (9.0, 5.0), (4.0, 9.0), (-1.0, 5.0)],
    )
    .unwrap()
}

fn seeded() -> HeuristicConfig {
    HeuristicConfig { seed: Some(11), ..Default::default() }
}

#[test]
fn corner_ring_on_square() {
    let instance = square_with_center();
    let params = Parameters::new(4, 0.5);

    let corners = Solution::from_ring(&instance, vec![0, 1, 2, 3], "manual");
    let expected = 0.5 * 40.0 + 0.5 * 50f64.sqrt();
    assert!((evaluate(&instance, &params, &corners).unwrap() - expected).abs() < EPS);

    let result = solve_exact(&instance, &params, &ExactConfig::default()).unwrap();
    assert!(result.optimal);
    assert_eq!(result.status, ExactStatus::Optimal);
    assert!(result.solution.is_hub(4));
    assert!((result.cost() - (10.0 + 1.5 * 50f64.sqrt())).abs() < 1e-4);
    assert!(result.cost() < expected);
}

#[test]
fn all_hubs_is_a_tour() {
    let instance = hexagon();
    let params = Parameters::new(6, 0.5);

    let result = solve_exact(&instance, &params, &ExactConfig::default()).unwrap();
    assert!(result.optimal);
    assert_eq!(result.solution.ring.len(), 6);
    assert!(result.evaluation.star_cost.abs() < EPS);
    assert!((result.cost() - 0.5 * result.evaluation.ring_length).abs() < EPS);

    let heuristic = solve_heuristic(&instance, &params, &seeded()).unwrap();
    assert!(heuristic.non_hubs().is_empty());
}

#[test]
fn zero_budget_returns_incumbent() {
    let instance = hexagon();
    let params = Parameters::new(5, 0.5);
    let config = ExactConfig { time_limit: 0.0, ..Default::default() };

    let result = solve_exact(&instance, &params, &config).unwrap();
    assert!(!result.optimal);
    assert_eq!(result.status, ExactStatus::SolverTimeout);
    assert_eq!(result.solution.ring.len(), 5);
    assert!(evaluate(&instance, &params, &result.solution).is_ok());
}

#[test]
fn heuristic_never_beats_proven_optimum() {
    let instance = hexagon();
    for hubs in 2..=5 {
        let params = Parameters::new(hubs, 0.5);
        let exact = solve_exact(&instance, &params, &ExactConfig::default()).unwrap();
        assert!(exact.optimal);

        let heuristic = solve_heuristic(&instance, &params, &seeded()).unwrap();
        let cost = evaluate(&instance, &params, &heuristic).unwrap();
        assert!(cost >= exact.cost() - 1e-4, "P={}: heuristic {} below optimum {}", hubs, cost, exact.cost());
    }
}

#[test]
fn ring_shrinks_as_alpha_grows() {
    let instance = hexagon();
    let mut previous = f64::INFINITY;
    for alpha in [0.1, 0.5, 0.9] {
        let params = Parameters::new(3, alpha);
        let result = solve_exact(&instance, &params, &ExactConfig::default()).unwrap();
        assert!(result.optimal);
        assert!(result.evaluation.ring_length <= previous + 1e-4);
        previous = result.evaluation.ring_length;
    }
}

#[test]
fn seeded_heuristic_is_reproducible() {
    let instance = hexagon();
    let params = Parameters::new(3, 0.3);

    let a = solve_heuristic(&instance, &params, &seeded()).unwrap();
    let b = solve_heuristic(&instance, &params, &seeded()).unwrap();
    assert_eq!(a.ring, b.ring);
    assert_eq!(a.assignment, b.assignment);
    assert_eq!(a.seed, Some(11));
}

#[test]
fn loads_tsplib_directory() {
    let dir = std::env::temp_dir().join(format!("ring-star-scenarios-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("square.tsp"),
        "NAME : square\nTYPE : TSP\nDIMENSION : 5\nEDGE_WEIGHT_TYPE : EUC_2D\nNODE_COORD_SECTION\n\
         1 0 0\n2 10 0\n3 10 10\n4 0 10\n5 5 5\nEOF\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("line.tsp"),
        "NAME : line\nDIMENSION : 3\nNODE_COORD_SECTION\n1 0 0\n2 3 0\n3 6 0\nEOF\n",
    )
    .unwrap();
    std::fs::write(dir.join("notes.txt"), "not an instance").unwrap();

    let instances = load_instances_from_dir(&dir, Some(Metric::Euclidean), None, None).unwrap();
    let names: Vec<&str> = instances.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["line", "square"]);
    assert!((instances[1].distance(0, 4) - 50f64.sqrt()).abs() < EPS);

    let large_only = load_instances_from_dir(&dir, Some(Metric::Euclidean), Some(4), None).unwrap();
    assert_eq!(large_only.len(), 1);

    let declared = load_instances_from_dir(&dir, None, None, None).unwrap();
    assert_eq!(declared[0].metric, Metric::Euclidean);
    assert_eq!(declared[1].metric, Metric::RoundedEuclidean);
    assert_eq!(declared[1].distance(0, 4), 7.0);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn batch_keeps_going_after_a_failure() {
    let instances = vec![
        Instance::from_coords("tiny", &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]).unwrap(),
        square_with_center(),
        hexagon(),
    ];
    let engine = ComparisonEngine::new(ExactConfig::default(), seeded());
    let config = BatchConfig { hubs: HubCount::Absolute(4), ..Default::default() };

    let report = BatchRunner::new(engine, config).run(&instances);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].instance, "tiny");
    assert_eq!(report.records.len(), 2);

    for record in &report.records {
        assert!(matches!(record.exact, ExactOutcome::Solved(_)));
        assert_eq!(record.gap_basis, GapBasis::Proven);
        assert!(record.gap.unwrap() >= -1e-5);
    }
}
