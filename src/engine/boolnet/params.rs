//! Simulation parameters
//!
//! Configuration texts are `lhs = value;` statements. `lhs` is a parameter
//! name, `Node.istate`, or a `$variable`; `value` is a number or a
//! `$variable`. Variables set through [`Settings::set_config_vars`] are
//! locked: later assignments to them are ignored.

use std::collections::{HashMap, HashSet};

use crate::engine::EngineError;
use super::network::{strip_comments, Network};

/// Upper bound on ticks per trajectory
pub const MAX_STEPS: usize = 1_000_000;

/// Resolved simulation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub time_tick: f64,
    pub max_time: f64,
    pub sample_count: usize,
    pub thread_count: usize,
    pub display_traj: bool,
    pub discrete_time: bool,
    pub seed: u64,

    /// Probability of each node starting active
    pub istate: Vec<f64>,
}

impl Params {
    pub fn new(node_count: usize) -> Self {
        Self {
            time_tick: 1.0,
            max_time: 10.0,
            sample_count: 100,
            thread_count: 1,
            display_traj: false,
            discrete_time: false,
            seed: 0,
            istate: vec![0.0; node_count],
        }
    }

    /// Number of ticks in one trajectory
    pub fn steps(&self) -> usize {
        (self.max_time / self.time_tick).floor() as usize
    }
}

/// Parameters plus configuration variables
#[derive(Debug, Clone)]
pub struct Settings {
    pub params: Params,
    vars: HashMap<String, f64>,
    locked: HashSet<String>,
}

impl Settings {
    pub fn new(node_count: usize) -> Self {
        Self {
            params: Params::new(node_count),
            vars: HashMap::new(),
            locked: HashSet::new(),
        }
    }

    /// Apply a `VAR=VALUE,VAR2=VALUE2` list; a leading `$` is optional
    pub fn set_config_vars(&mut self, list: &str) -> Result<(), EngineError> {
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, value) = item.split_once('=').ok_or_else(|| {
                EngineError::Config(format!("expected VAR=VALUE, got {:?}", item))
            })?;
            let name = name.trim().trim_start_matches('$').to_string();
            if name.is_empty() {
                return Err(EngineError::Config(format!("missing variable name in {:?}", item)));
            }
            let value = self.value(value)?;
            self.vars.insert(name.clone(), value);
            self.locked.insert(name);
        }
        Ok(())
    }

    /// Apply every statement of a configuration text
    pub fn apply(&mut self, text: &str, network: &Network) -> Result<(), EngineError> {
        for statement in strip_comments(text).split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            let (lhs, rhs) = statement.split_once('=').ok_or_else(|| {
                EngineError::Config(format!("expected `name = value` in {:?}", statement))
            })?;
            self.assign(lhs.trim(), rhs, network)?;
        }
        Ok(())
    }

    fn assign(&mut self, lhs: &str, rhs: &str, network: &Network) -> Result<(), EngineError> {
        if let Some(var) = lhs.strip_prefix('$') {
            if self.locked.contains(var) {
                tracing::debug!("Variable ${} is fixed by configuration variables", var);
                return Ok(());
            }
            let value = self.value(rhs)?;
            self.vars.insert(var.to_string(), value);
            return Ok(());
        }

        let value = self.value(rhs)?;

        if let Some(node) = lhs.strip_suffix(".istate") {
            let i = network
                .index_of(node.trim())
                .ok_or_else(|| EngineError::Config(format!("unknown node {}", node.trim())))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!(
                    "{}.istate must be within [0, 1], got {}",
                    node.trim(),
                    value
                )));
            }
            self.params.istate[i] = value;
            return Ok(());
        }

        let p = &mut self.params;
        match lhs {
            "time_tick" => p.time_tick = value,
            "max_time" => p.max_time = value,
            "sample_count" => p.sample_count = count(lhs, value)?,
            "thread_count" => p.thread_count = count(lhs, value)?,
            "display_traj" => p.display_traj = value != 0.0,
            "discrete_time" => p.discrete_time = value != 0.0,
            "seed_pseudorandom" => p.seed = value as u64,
            other => {
                return Err(EngineError::Config(format!("unknown parameter {}", other)));
            }
        }
        Ok(())
    }

    /// Evaluate a value: a number or `$variable`
    fn value(&self, text: &str) -> Result<f64, EngineError> {
        let text = text.trim();
        if let Some(var) = text.strip_prefix('$') {
            return self
                .vars
                .get(var)
                .copied()
                .ok_or_else(|| EngineError::Config(format!("undefined variable ${}", var)));
        }
        text.parse::<f64>()
            .map_err(|_| EngineError::Config(format!("invalid value {:?}", text)))
    }

    /// Reject parameter combinations a run cannot use
    pub fn validate(&self) -> Result<(), EngineError> {
        let p = &self.params;
        if !(p.time_tick > 0.0) {
            return Err(EngineError::Config("time_tick must be positive".to_string()));
        }
        if !(p.max_time >= p.time_tick) {
            return Err(EngineError::Config(
                "max_time must be at least time_tick".to_string(),
            ));
        }
        if p.steps() > MAX_STEPS {
            return Err(EngineError::Config(format!(
                "max_time / time_tick exceeds {} steps",
                MAX_STEPS
            )));
        }
        Ok(())
    }
}

/// A positive integer parameter
fn count(name: &str, value: f64) -> Result<usize, EngineError> {
    if value >= 1.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(EngineError::Config(format!(
            "{} must be a positive integer, got {}",
            name, value
        )))
    }
}
