//! Reference Engine Tests
//!
//! Tests for the Boolean-network engine through its public API.

use std::sync::Arc;

use tempfile::TempDir;

use maboss_rpc::engine::boolnet::{
    format_float, simulate, BoolNetEngine, Network, Params, Settings, MAX_NODES,
};
use maboss_rpc::engine::{
    CancelToken, Dispatcher, EngineError, NodePolicy, OutputFiles, RunOptions, Simulation,
    SimulationEngine,
};
use maboss_rpc::protocol::{status, ClientData, Command, Flags};

const CELL_CYCLE: &str = "
// toy cell cycle
CycD   = CycD;
Rb     = !CycD;
E2F    = !Rb | Cyclin;   # positive feedback
Cyclin = !CycD AND E2F;
";

fn outputs(dir: &TempDir, trajectory: bool) -> OutputFiles {
    let p = |name: &str| dir.path().join(name);
    OutputFiles {
        run_log: p("run.txt"),
        trajectory: trajectory.then(|| p("traj.txt")),
        trajectory_probability: p("probtraj.csv"),
        stationary_distribution: p("statdist.csv"),
        fixed_points: p("fp.csv"),
    }
}

// =============================================================================
// Model Parsing Tests
// =============================================================================

#[test]
fn test_parse_cell_cycle() {
    let net = Network::parse(CELL_CYCLE, NodePolicy::Strict).unwrap();
    assert_eq!(net.len(), 4);
    assert_eq!(net.index_of("E2F"), Some(2));
    assert_eq!(net.index_of("Missing"), None);
}

#[test]
fn test_operator_spellings_agree() {
    let symbolic = Network::parse("A = B & !C | B ^ C; B = B; C = C;", NodePolicy::Strict).unwrap();
    let words =
        Network::parse("A = B AND NOT C OR B XOR C; B = B; C = C;", NodePolicy::Strict).unwrap();
    let doubled = Network::parse("A = B && !C || B ^ C; B = B; C = C;", NodePolicy::Strict).unwrap();
    for state in 0..8u64 {
        assert_eq!(symbolic.target(0, state), words.target(0, state));
        assert_eq!(symbolic.target(0, state), doubled.target(0, state));
    }
}

#[test]
fn test_parentheses_change_binding() {
    let loose = Network::parse("A = B | C & FALSE; B = B; C = C;", NodePolicy::Strict).unwrap();
    let grouped = Network::parse("A = (B | C) & FALSE; B = B; C = C;", NodePolicy::Strict).unwrap();
    let b_only = 0b010;
    assert!(loose.target(0, b_only));
    assert!(!grouped.target(0, b_only));
}

#[test]
fn test_parse_errors() {
    let cases = [
        "",
        "// only a comment",
        "A = B;",
        "A = ;",
        "A = (A;",
        "A = A A;",
        "1A = TRUE;",
        "A TRUE;",
        "A = A $ A;",
    ];
    for text in cases {
        assert!(
            matches!(Network::parse(text, NodePolicy::Strict), Err(EngineError::Parse(_))),
            "{:?} should not parse",
            text
        );
    }
}

#[test]
fn test_node_policies() {
    let text = "A = FALSE; B = B; A = B;";
    assert!(Network::parse(text, NodePolicy::Strict).is_err());

    let overridden = Network::parse(text, NodePolicy::Override).unwrap();
    assert!(overridden.target(0, 0b10));
    assert!(!overridden.target(0, 0b00));

    let augmented = Network::parse("A = FALSE; B = B; A = B; A = TRUE;", NodePolicy::Augment).unwrap();
    assert!(augmented.target(0, 0b00));
    assert_eq!(augmented.len(), 2);
}

#[test]
fn test_node_limit() {
    let fits: String = (0..MAX_NODES).map(|i| format!("N{} = N{};", i, i)).collect();
    assert_eq!(Network::parse(&fits, NodePolicy::Strict).unwrap().len(), MAX_NODES);

    let too_many: String = (0..=MAX_NODES).map(|i| format!("N{} = N{};", i, i)).collect();
    assert!(Network::parse(&too_many, NodePolicy::Strict).is_err());
}

#[test]
fn test_deeply_nested_rule_is_rejected() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(Arc::new(BoolNetEngine::new()), dir.path());

    let nested = format!("A = {}A{};", "(".repeat(10_000), ")".repeat(10_000));
    let response = dispatcher.dispatch(
        ClientData::new(Command::Check).with_network(nested),
        &CancelToken::new(),
    );
    assert_eq!(response.status, status::ENGINE_FAILURE);
    assert!(response.error_message.contains("nested too deeply"), "{}", response.error_message);
}

#[test]
fn test_long_rules_do_not_exhaust_the_stack() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(Arc::new(BoolNetEngine::new()), dir.path());

    let rules = [
        format!("A = {}A;", "!".repeat(20_000)),
        format!("A = {};", vec!["A"; 20_000].join(" & ")),
        format!("A = A; {}", "A = !A;".repeat(5_000)),
    ];
    for network in rules {
        let request = ClientData::new(Command::Run)
            .with_network(network)
            .with_flags(Flags::AUGMENT)
            .with_config("max_time = 2; sample_count = 2;");
        let response = dispatcher.dispatch(request, &CancelToken::new());
        assert!(response.is_ok(), "{:?}", response.error_message);
    }
}

// =============================================================================
// Settings Tests
// =============================================================================

#[test]
fn test_settings_statements_and_comments() {
    let net = Network::parse(CELL_CYCLE, NodePolicy::Strict).unwrap();
    let mut settings = Settings::new(net.len());
    settings
        .apply(
            "time_tick = 0.5; // half steps\nmax_time = 10;\nCycD.istate = 0.25;\n# seed\nseed_pseudorandom = 9;",
            &net,
        )
        .unwrap();
    settings.validate().unwrap();
    assert_eq!(settings.params.steps(), 20);
    assert_eq!(settings.params.istate[0], 0.25);
    assert_eq!(settings.params.seed, 9);
}

#[test]
fn test_config_vars_accept_dollar_prefix() {
    let net = Network::parse("A = A;", NodePolicy::Strict).unwrap();
    let mut settings = Settings::new(net.len());
    settings.set_config_vars("$count=4, tick=0.25").unwrap();
    settings
        .apply("$count = 100; sample_count = $count; time_tick = $tick;", &net)
        .unwrap();
    assert_eq!(settings.params.sample_count, 4);
    assert_eq!(settings.params.time_tick, 0.25);
}

#[test]
fn test_validate_rejects_oversized_runs() {
    let net = Network::parse("A = A;", NodePolicy::Strict).unwrap();
    let mut settings = Settings::new(net.len());
    settings.apply("time_tick = 0.000001; max_time = 100;", &net).unwrap();
    assert!(matches!(settings.validate(), Err(EngineError::Config(_))));
}

// =============================================================================
// Simulation Tests
// =============================================================================

#[test]
fn test_cell_cycle_reaches_fixed_points() {
    let net = Network::parse(CELL_CYCLE, NodePolicy::Strict).unwrap();
    let params = Params {
        max_time: 30.0,
        sample_count: 50,
        istate: vec![0.5, 0.0, 0.0, 0.0],
        seed: 7,
        ..Params::new(net.len())
    };
    let report = simulate(&net, &params, false, &CancelToken::new()).unwrap();

    assert!(report.stationary_distribution.starts_with("State\tProba\n"));
    assert!(report.trajectory_probability.starts_with("Time\tState\tProba\n"));
    assert!(report.fixed_points.starts_with("Fixed Points ("));
    assert!(report.run_log.contains("sample_count: 50"));

    // Probabilities of final states sum to one
    let total: f64 = report
        .stationary_distribution
        .lines()
        .skip(1)
        .map(|l| l.rsplit('\t').next().unwrap().parse::<f64>().unwrap())
        .sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_discrete_time_is_synchronous() {
    let net = Network::parse("A = !B; B = A;", NodePolicy::Strict).unwrap();
    let params = Params {
        max_time: 4.0,
        sample_count: 1,
        display_traj: true,
        discrete_time: true,
        ..Params::new(net.len())
    };
    let report = simulate(&net, &params, false, &CancelToken::new()).unwrap();
    assert_eq!(
        report.trajectory.as_deref(),
        Some("Time\tState\n0\t<nil>\n1\tA\n2\tA -- B\n3\tB\n4\t<nil>\n")
    );
}

#[test]
fn test_hexfloat_times() {
    let net = Network::parse("A = A;", NodePolicy::Strict).unwrap();
    let params = Params {
        time_tick: 0.5,
        max_time: 1.0,
        sample_count: 1,
        display_traj: true,
        ..Params::new(net.len())
    };
    let report = simulate(&net, &params, true, &CancelToken::new()).unwrap();
    assert_eq!(
        report.trajectory.as_deref(),
        Some("Time\tState\n0x0p+0\t<nil>\n0x1p-1\t<nil>\n0x1p+0\t<nil>\n")
    );
    assert_eq!(format_float(0.5, false), "0.5");
}

// =============================================================================
// Engine Contract Tests
// =============================================================================

#[test]
fn test_engine_load_configure_run() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("model.bnd");
    std::fs::write(&model, CELL_CYCLE).unwrap();

    let engine = BoolNetEngine::new();
    assert_eq!(engine.name(), "boolnet");
    engine.init().unwrap();

    let mut sim = engine.load(&model, &RunOptions::default()).unwrap();
    sim.set_config_vars("n=5").unwrap();
    sim.apply_config("sample_count = $n; max_time = 3;").unwrap();
    sim.apply_config_expr("display_traj = 1").unwrap();
    sim.check().unwrap();
    assert!(sim.wants_trajectory());

    let files = outputs(&dir, true);
    sim.run(&files, &CancelToken::new()).unwrap();

    let traj = std::fs::read_to_string(files.trajectory.as_ref().unwrap()).unwrap();
    assert!(traj.starts_with("Time\tState\n"));
    let log = std::fs::read_to_string(&files.run_log).unwrap();
    assert!(log.contains("sample_count: 5"));
    for path in [&files.trajectory_probability, &files.stationary_distribution, &files.fixed_points] {
        assert!(path.exists());
    }
}

#[test]
fn test_engine_trajectory_needs_single_thread() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("model.bnd");
    std::fs::write(&model, "A = !A;").unwrap();

    let mut sim = BoolNetEngine::new().load(&model, &RunOptions::default()).unwrap();
    sim.apply_config("display_traj = 1; thread_count = 2;").unwrap();
    assert!(!sim.wants_trajectory());

    let files = outputs(&dir, false);
    sim.run(&files, &CancelToken::new()).unwrap();
    assert!(!dir.path().join("traj.txt").exists());
}

#[test]
fn test_engine_missing_model_file() {
    let dir = TempDir::new().unwrap();
    let result = BoolNetEngine::new().load(&dir.path().join("absent.bnd"), &RunOptions::default());
    assert!(matches!(result, Err(EngineError::Io(_))));
}
