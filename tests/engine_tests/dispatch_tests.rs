//! Dispatch Tests
//!
//! Tests for driving an engine through one request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use maboss_rpc::engine::boolnet::BoolNetEngine;
use maboss_rpc::engine::{
    CancelToken, Dispatcher, EngineError, NodePolicy, OutputFiles, RunOptions, Simulation,
    SimulationEngine,
};
use maboss_rpc::protocol::{status, ClientData, Command, Flags};

// =============================================================================
// Recording Engine
// =============================================================================

/// Call log shared between a test and its engine
type Calls = Arc<Mutex<Vec<String>>>;

/// Engine that records every call and can be told to fail or panic
struct Recorder {
    calls: Calls,
    fail_on: Option<&'static str>,
    panic_on_run: bool,
}

struct RecordedRun {
    calls: Calls,
    fail_on: Option<&'static str>,
    panic_on_run: bool,
}

impl Recorder {
    fn new() -> (Self, Calls) {
        let calls = Calls::default();
        let engine = Self {
            calls: Arc::clone(&calls),
            fail_on: None,
            panic_on_run: false,
        };
        (engine, calls)
    }
}

impl SimulationEngine for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn load(&self, network: &Path, options: &RunOptions) -> Result<Box<dyn Simulation>, EngineError> {
        let text = std::fs::read_to_string(network)?;
        self.calls
            .lock()
            .push(format!("load {} {:?} hex={}", text, options.nodes, options.hexfloat));
        if self.fail_on == Some("load") {
            return Err(EngineError::Parse("cannot parse".to_string()));
        }
        Ok(Box::new(RecordedRun {
            calls: Arc::clone(&self.calls),
            fail_on: self.fail_on,
            panic_on_run: self.panic_on_run,
        }))
    }
}

impl RecordedRun {
    fn record(&self, step: &'static str, detail: &str) -> Result<(), EngineError> {
        self.calls.lock().push(format!("{} {}", step, detail));
        if self.fail_on == Some(step) {
            return Err(EngineError::Config(format!("{} rejected", step)));
        }
        Ok(())
    }
}

impl Simulation for RecordedRun {
    fn set_config_vars(&mut self, vars: &str) -> Result<(), EngineError> {
        self.record("vars", vars)
    }

    fn apply_config(&mut self, config: &str) -> Result<(), EngineError> {
        self.record("config", config)
    }

    fn apply_config_expr(&mut self, expr: &str) -> Result<(), EngineError> {
        self.record("expr", expr)
    }

    fn check(&mut self) -> Result<(), EngineError> {
        self.record("check", "")
    }

    fn wants_trajectory(&self) -> bool {
        true
    }

    fn run(&mut self, outputs: &OutputFiles, _: &CancelToken) -> Result<(), EngineError> {
        self.record("run", "")?;
        if self.panic_on_run {
            panic!("engine blew up");
        }
        let paths: Vec<&PathBuf> = [
            &outputs.run_log,
            &outputs.trajectory_probability,
            &outputs.stationary_distribution,
            &outputs.fixed_points,
        ]
        .into_iter()
        .chain(outputs.trajectory.as_ref())
        .collect();
        for path in paths {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            std::fs::write(path, format!("contents of {}", name))?;
        }
        Ok(())
    }
}

/// Files the dispatcher left in `dir`
fn leftovers(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

fn full_request(command: Command) -> ClientData {
    ClientData::new(command)
        .with_network("A = A;")
        .with_config("cfg one")
        .with_config("cfg two")
        .with_config_expr("expr one")
        .with_config_vars("x=1")
}

// =============================================================================
// Invocation Sequence Tests
// =============================================================================

#[test]
fn test_run_sequence_and_outputs() {
    let dir = TempDir::new().unwrap();
    let (engine, calls) = Recorder::new();
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let response = dispatcher.dispatch(full_request(Command::Run), &CancelToken::new());
    assert!(response.is_ok(), "{:?}", response);

    assert_eq!(
        *calls.lock(),
        vec![
            "load A = A; Strict hex=false",
            "vars x=1",
            "config cfg one",
            "config cfg two",
            "expr expr one",
            "check ",
            "run ",
        ]
    );
    assert!(response.run_log.ends_with("_run.txt"));
    assert!(response.trajectory.ends_with("_traj.txt"));
    assert!(response.trajectory_probability.ends_with("_probtraj.csv"));
    assert!(response.stationary_distribution.ends_with("_statdist.csv"));
    assert!(response.fixed_points.ends_with("_fp.csv"));
    assert_eq!(leftovers(dir.path()), 0);
}

#[test]
fn test_check_stops_before_run() {
    let dir = TempDir::new().unwrap();
    let (engine, calls) = Recorder::new();
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let response = dispatcher.dispatch(full_request(Command::Check), &CancelToken::new());
    assert!(response.is_ok());
    assert!(response.run_log.is_empty());
    assert_eq!(calls.lock().last().map(String::as_str), Some("check "));
    assert_eq!(leftovers(dir.path()), 0);
}

#[test]
fn test_empty_config_vars_not_applied() {
    let dir = TempDir::new().unwrap();
    let (engine, calls) = Recorder::new();
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let request = ClientData::new(Command::Check).with_network("A = A;");
    dispatcher.dispatch(request, &CancelToken::new());
    assert!(!calls.lock().iter().any(|c| c.starts_with("vars")));
}

#[test]
fn test_flags_become_run_options() {
    let dir = TempDir::new().unwrap();
    let (engine, calls) = Recorder::new();
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let request = ClientData::new(Command::Check)
        .with_network("A = A;")
        .with_flags(Flags::HEXFLOAT | Flags::AUGMENT);
    dispatcher.dispatch(request, &CancelToken::new());
    assert_eq!(calls.lock()[0], "load A = A; Augment hex=true");
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_engine_errors_become_status_and_cleanup() {
    for step in ["load", "vars", "config", "expr", "check", "run"] {
        let dir = TempDir::new().unwrap();
        let (mut engine, _calls) = Recorder::new();
        engine.fail_on = Some(step);
        let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

        let response = dispatcher.dispatch(full_request(Command::Run), &CancelToken::new());
        assert_eq!(response.status, status::ENGINE_FAILURE, "step {}", step);
        assert!(!response.error_message.is_empty());
        assert!(response.run_log.is_empty());
        assert_eq!(leftovers(dir.path()), 0, "temp files left after {} failure", step);
    }
}

#[test]
fn test_conflicting_flags() {
    let dir = TempDir::new().unwrap();
    let (engine, calls) = Recorder::new();
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let request = full_request(Command::Run).with_flags(Flags::OVERRIDE | Flags::AUGMENT);
    let response = dispatcher.dispatch(request, &CancelToken::new());
    assert_eq!(response.status, status::ENGINE_FAILURE);
    assert!(response.error_message.contains("mutually exclusive"));
    assert!(calls.lock().is_empty());
}

#[test]
fn test_parse_command_not_dispatched() {
    let dir = TempDir::new().unwrap();
    let (engine, calls) = Recorder::new();
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let response = dispatcher.dispatch(full_request(Command::Parse), &CancelToken::new());
    assert_eq!(response.status, status::UNSUPPORTED_COMMAND);
    assert!(calls.lock().is_empty());
}

#[test]
fn test_engine_panic_is_contained() {
    let dir = TempDir::new().unwrap();
    let (mut engine, _calls) = Recorder::new();
    engine.panic_on_run = true;
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let response = dispatcher.dispatch(full_request(Command::Run), &CancelToken::new());
    assert_eq!(response.status, status::INTERNAL_ERROR);
    assert_eq!(leftovers(dir.path()), 0);
}

#[test]
fn test_cancelled_before_run() {
    let dir = TempDir::new().unwrap();
    let (engine, calls) = Recorder::new();
    let dispatcher = Dispatcher::new(Arc::new(engine), dir.path());

    let cancel = CancelToken::new();
    cancel.cancel();
    let response = dispatcher.dispatch(full_request(Command::Run), &cancel);
    assert_eq!(response.status, status::ENGINE_FAILURE);
    assert!(!calls.lock().iter().any(|c| c.starts_with("run")));
}

// =============================================================================
// Reference Engine Tests
// =============================================================================

#[test]
fn test_boolnet_run_through_dispatcher() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(Arc::new(BoolNetEngine::new()), dir.path())
        .with_max_run_time(Some(Duration::from_secs(30)));

    let request = ClientData::new(Command::Run)
        .with_network("A = TRUE; B = A;")
        .with_config("max_time = 3; sample_count = 4; display_traj = 1;")
        .with_config_expr("time_tick = 1");
    let response = dispatcher.dispatch(request, &CancelToken::new());

    assert!(response.is_ok(), "{:?}", response);
    assert!(response.trajectory.starts_with("Time\tState\n0\t<nil>\n"));
    assert_eq!(response.stationary_distribution, "State\tProba\nA -- B\t1\n");
    assert!(response.run_log.contains("sample_count: 4"));
    assert_eq!(leftovers(dir.path()), 0);
}

#[test]
fn test_boolnet_config_vars_take_precedence() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(Arc::new(BoolNetEngine::new()), dir.path());

    let request = ClientData::new(Command::Run)
        .with_network("A = A;")
        .with_config("$n = 50; sample_count = $n; max_time = 1;")
        .with_config_vars("n=3");
    let response = dispatcher.dispatch(request, &CancelToken::new());
    assert!(response.is_ok(), "{:?}", response);
    assert!(response.run_log.contains("sample_count: 3"));
}

#[test]
fn test_boolnet_override_policy() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(Arc::new(BoolNetEngine::new()), dir.path());
    let network = "A = FALSE; A = TRUE;";

    let strict = ClientData::new(Command::Check).with_network(network);
    assert_eq!(
        dispatcher.dispatch(strict, &CancelToken::new()).status,
        status::ENGINE_FAILURE
    );

    let overridden = ClientData::new(Command::Run)
        .with_network(network)
        .with_flags(Flags::OVERRIDE)
        .with_config_expr("max_time = 1; sample_count = 2");
    let response = dispatcher.dispatch(overridden, &CancelToken::new());
    assert!(response.is_ok(), "{:?}", response);
    assert_eq!(response.stationary_distribution, "State\tProba\nA\t1\n");
}

#[test]
fn test_node_policy_default_is_strict() {
    assert_eq!(RunOptions::default().nodes, NodePolicy::Strict);
    assert!(matches!(
        RunOptions::from_flags(Flags::OVERRIDE | Flags::AUGMENT),
        Err(EngineError::ConflictingFlags)
    ));
}
