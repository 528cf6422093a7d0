//! Engine Module
//!
//! The contract between the server and a simulation engine, plus the
//! server-side driver for it.
//!
//! ## Invocation Sequence
//! 1. Write the network text to a per-request temp file
//! 2. [`SimulationEngine::load`] the model
//! 3. Apply configuration variables, then each configuration text, then
//!    each configuration expression
//! 4. [`Simulation::check`]; a `check` request stops here
//! 5. [`Simulation::run`] into the five output files and read them back
//!
//! Every temp file is removed when the request ends, whatever the outcome.
//! Engine settings travel in [`RunOptions`] per call; nothing is global.

pub mod boolnet;
mod dispatch;
mod workspace;

pub use dispatch::Dispatcher;
pub use workspace::Workspace;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::protocol::Flags;

/// Domain error raised by an engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("network parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("override and augment flags are mutually exclusive")]
    ConflictingFlags,

    #[error("simulation error: {0}")]
    Simulation(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("engine IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How repeated node definitions are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodePolicy {
    /// A second definition is an error
    #[default]
    Strict,

    /// The latest definition wins
    Override,

    /// Definitions are merged
    Augment,
}

/// Per-run engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Print floats in hexadecimal notation
    pub hexfloat: bool,

    pub nodes: NodePolicy,
}

impl RunOptions {
    /// Build options from request flags
    pub fn from_flags(flags: Flags) -> Result<Self, EngineError> {
        let nodes = match (flags.contains(Flags::OVERRIDE), flags.contains(Flags::AUGMENT)) {
            (true, true) => return Err(EngineError::ConflictingFlags),
            (true, false) => NodePolicy::Override,
            (false, true) => NodePolicy::Augment,
            (false, false) => NodePolicy::Strict,
        };
        Ok(Self {
            hexfloat: flags.contains(Flags::HEXFLOAT),
            nodes,
        })
    }
}

/// Cooperative cancellation flag shared with a running engine
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Files an engine run writes its outputs to
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub run_log: PathBuf,

    /// Only set when the simulation asked for a trajectory
    pub trajectory: Option<PathBuf>,

    pub trajectory_probability: PathBuf,
    pub stationary_distribution: PathBuf,
    pub fixed_points: PathBuf,
}

/// A simulation engine
pub trait SimulationEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// One-time global initialization, run before the server binds
    fn init(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Parse the model at `network`
    fn load(&self, network: &Path, options: &RunOptions)
        -> Result<Box<dyn Simulation>, EngineError>;
}

/// A loaded model being configured and run
pub trait Simulation: Send {
    /// Apply `VAR=VALUE,...` overrides; they win over later assignments
    fn set_config_vars(&mut self, vars: &str) -> Result<(), EngineError>;

    /// Apply the text of one configuration file
    fn apply_config(&mut self, config: &str) -> Result<(), EngineError>;

    /// Apply one inline configuration expression
    fn apply_config_expr(&mut self, expr: &str) -> Result<(), EngineError>;

    /// Cross-check model and configuration
    fn check(&mut self) -> Result<(), EngineError>;

    /// Whether a run produces a trajectory output
    fn wants_trajectory(&self) -> bool;

    /// Run the simulation, writing every output file it was given
    fn run(&mut self, outputs: &OutputFiles, cancel: &CancelToken) -> Result<(), EngineError>;
}
