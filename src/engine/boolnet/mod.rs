//! Reference Boolean-network engine
//!
//! A small asynchronous Boolean-network simulator implementing
//! [`SimulationEngine`], so the server runs without an external engine.
//!
//! ## Model
//! ```text
//! // comment
//! Cyclin = !CycD & E2F;
//! E2F    = !Rb | Cyclin;
//! Rb     = !CycD;
//! CycD   = CycD;
//! ```
//!
//! ## Configuration
//! ```text
//! time_tick = 0.5; max_time = 20; sample_count = 500;
//! CycD.istate = 0.5; $rate = 2; seed_pseudorandom = 42;
//! ```

mod expr;
mod format;
mod network;
mod params;
mod simulate;

pub use format::{format_float, hexfloat};
pub use network::{Network, MAX_NODES};
pub use params::{Params, Settings};
pub use simulate::{simulate, Report};

use std::path::Path;

use crate::engine::{
    CancelToken, EngineError, OutputFiles, RunOptions, Simulation, SimulationEngine,
};

/// The reference engine
#[derive(Debug, Default, Clone, Copy)]
pub struct BoolNetEngine;

impl BoolNetEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SimulationEngine for BoolNetEngine {
    fn name(&self) -> &str {
        "boolnet"
    }

    fn load(
        &self,
        network: &Path,
        options: &RunOptions,
    ) -> Result<Box<dyn Simulation>, EngineError> {
        let text = std::fs::read_to_string(network)?;
        let network = Network::parse(&text, options.nodes)?;
        tracing::debug!("Loaded network with {} nodes", network.len());
        Ok(Box::new(BoolNetSimulation::new(network, *options)))
    }
}

/// A loaded network and its settings
#[derive(Debug, Clone)]
pub struct BoolNetSimulation {
    network: Network,
    settings: Settings,
    options: RunOptions,
}

impl BoolNetSimulation {
    pub fn new(network: Network, options: RunOptions) -> Self {
        let settings = Settings::new(network.len());
        Self {
            network,
            settings,
            options,
        }
    }

    pub fn params(&self) -> &Params {
        &self.settings.params
    }
}

impl Simulation for BoolNetSimulation {
    fn set_config_vars(&mut self, vars: &str) -> Result<(), EngineError> {
        self.settings.set_config_vars(vars)
    }

    fn apply_config(&mut self, config: &str) -> Result<(), EngineError> {
        self.settings.apply(config, &self.network)
    }

    fn apply_config_expr(&mut self, expr: &str) -> Result<(), EngineError> {
        self.settings.apply(expr, &self.network)
    }

    fn check(&mut self) -> Result<(), EngineError> {
        self.settings.validate()
    }

    fn wants_trajectory(&self) -> bool {
        let p = self.params();
        p.display_traj && p.thread_count == 1
    }

    fn run(&mut self, outputs: &OutputFiles, cancel: &CancelToken) -> Result<(), EngineError> {
        let report = simulate(&self.network, self.params(), self.options.hexfloat, cancel)?;

        std::fs::write(&outputs.run_log, &report.run_log)?;
        if let (Some(path), Some(trajectory)) = (&outputs.trajectory, &report.trajectory) {
            std::fs::write(path, trajectory)?;
        }
        std::fs::write(&outputs.trajectory_probability, &report.trajectory_probability)?;
        std::fs::write(&outputs.stationary_distribution, &report.stationary_distribution)?;
        std::fs::write(&outputs.fixed_points, &report.fixed_points)?;
        Ok(())
    }
}
