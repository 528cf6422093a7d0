//! Request Dispatch
//!
//! Drives a [`SimulationEngine`] through one request and turns the outcome
//! into a [`ServerData`]. The engine runs on its own job thread so a panic
//! or an overlong run never takes the handler down with it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};

use crate::protocol::{status, ClientData, Command, ServerData};
use super::workspace::read_output;
use super::{CancelToken, EngineError, OutputFiles, RunOptions, SimulationEngine, Workspace};

/// Runs requests against an engine
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<dyn SimulationEngine>,

    /// Directory for per-request temp files
    work_dir: PathBuf,

    /// Wall-clock cap on a single run
    max_run_time: Option<Duration>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn SimulationEngine>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            work_dir: work_dir.into(),
            max_run_time: None,
        }
    }

    pub fn with_max_run_time(mut self, limit: Option<Duration>) -> Self {
        self.max_run_time = limit;
        self
    }

    pub fn engine(&self) -> &dyn SimulationEngine {
        self.engine.as_ref()
    }

    /// Execute `request`, always producing a well-formed response
    ///
    /// Cancelling `cancel` asks the engine to stop; on timeout the token is
    /// cancelled here.
    pub fn dispatch(&self, request: ClientData, cancel: &CancelToken) -> ServerData {
        if request.command == Command::Parse {
            return ServerData::failure(
                status::UNSUPPORTED_COMMAND,
                format!("command {:?} is not supported by this server", request.command.as_str()),
            );
        }

        let options = match RunOptions::from_flags(request.flags) {
            Ok(options) => options,
            Err(e) => return ServerData::failure(status::ENGINE_FAILURE, e.to_string()),
        };

        let (tx, rx) = channel::bounded(1);
        let engine = Arc::clone(&self.engine);
        let work_dir = self.work_dir.clone();
        let job_cancel = cancel.clone();

        let spawned = thread::Builder::new()
            .name("maboss-job".to_string())
            .spawn(move || {
                let result = run_job(engine.as_ref(), &request, &options, &work_dir, &job_cancel);
                // The handler may have given up waiting
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            return ServerData::failure(
                status::INTERNAL_ERROR,
                format!("cannot start engine job: {}", e),
            );
        }

        let outcome = match self.max_run_time {
            Some(limit) => rx.recv_timeout(limit),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::debug!("Engine {} failed: {}", self.engine.name(), e);
                ServerData::failure(status::ENGINE_FAILURE, e.to_string())
            }
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                let limit = self.max_run_time.unwrap_or_default();
                tracing::warn!("Engine run exceeded {:?}, cancelling", limit);
                ServerData::failure(
                    status::RUN_TIMEOUT,
                    format!("run exceeded the {} ms limit", limit.as_millis()),
                )
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("Engine {} panicked", self.engine.name());
                ServerData::failure(status::INTERNAL_ERROR, "engine run aborted unexpectedly")
            }
        }
    }
}

/// One request against the engine; temp files go away with the workspace
fn run_job(
    engine: &dyn SimulationEngine,
    request: &ClientData,
    options: &RunOptions,
    work_dir: &Path,
    cancel: &CancelToken,
) -> Result<ServerData, EngineError> {
    let mut workspace = Workspace::create(work_dir);

    let network = workspace.write("network.bnd", &request.network)?;
    let mut simulation = engine.load(&network, options)?;

    if !request.config_vars.is_empty() {
        simulation.set_config_vars(&request.config_vars)?;
    }
    for config in &request.configs {
        simulation.apply_config(config)?;
    }
    for expr in &request.config_exprs {
        simulation.apply_config_expr(expr)?;
    }
    simulation.check()?;

    if request.command == Command::Check {
        return Ok(ServerData::ok());
    }
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let trajectory = simulation
        .wants_trajectory()
        .then(|| workspace.path("traj.txt"));
    let outputs = OutputFiles {
        run_log: workspace.path("run.txt"),
        trajectory,
        trajectory_probability: workspace.path("probtraj.csv"),
        stationary_distribution: workspace.path("statdist.csv"),
        fixed_points: workspace.path("fp.csv"),
    };

    simulation.run(&outputs, cancel)?;

    Ok(ServerData {
        run_log: read_output(&outputs.run_log)?,
        trajectory: match &outputs.trajectory {
            Some(path) => read_output(path)?,
            None => String::new(),
        },
        trajectory_probability: read_output(&outputs.trajectory_probability)?,
        stationary_distribution: read_output(&outputs.stationary_distribution)?,
        fixed_points: read_output(&outputs.fixed_points)?,
        ..ServerData::ok()
    })
}
