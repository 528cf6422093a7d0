//! Trajectory sampling
//!
//! Each sample starts from a state drawn from the `istate` probabilities.
//! At every tick one unstable node, chosen uniformly, flips (asynchronous
//! update); with `discrete_time` all nodes update at once instead.

use std::collections::HashMap;
use std::fmt::Write;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::{CancelToken, EngineError};
use super::format::format_float;
use super::network::Network;
use super::params::Params;

/// Networks up to this size get an exhaustive fixed-point search
pub const MAX_FIXED_POINT_NODES: usize = 20;

/// Rendered outputs of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub run_log: String,
    pub trajectory: Option<String>,
    pub trajectory_probability: String,
    pub stationary_distribution: String,
    pub fixed_points: String,
}

/// State counts at one time point
type Histogram = HashMap<u64, usize>;

/// Sample `params.sample_count` trajectories of `network`
pub fn simulate(
    network: &Network,
    params: &Params,
    hexfloat: bool,
    cancel: &CancelToken,
) -> Result<Report, EngineError> {
    let started = Instant::now();
    let steps = params.steps();
    let keep_trajectory = params.display_traj && params.thread_count == 1;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut per_tick: Vec<Histogram> = vec![Histogram::new(); steps + 1];
    let mut finals = Histogram::new();
    let mut trajectory = keep_trajectory.then(|| String::from("Time\tState\n"));

    for sample in 0..params.sample_count {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut state = initial_state(&params.istate, &mut rng);
        for (tick, histogram) in per_tick.iter_mut().enumerate() {
            if tick > 0 {
                state = step(network, state, params.discrete_time, &mut rng);
            }
            *histogram.entry(state).or_default() += 1;
            if sample == 0 {
                if let Some(out) = trajectory.as_mut() {
                    let time = tick as f64 * params.time_tick;
                    let _ = writeln!(
                        out,
                        "{}\t{}",
                        format_float(time, hexfloat),
                        network.format_state(state)
                    );
                }
            }
        }
        *finals.entry(state).or_default() += 1;
    }

    let samples = params.sample_count as f64;
    let proba = |count: usize| format_float(count as f64 / samples, hexfloat);

    let mut trajectory_probability = String::from("Time\tState\tProba\n");
    for (tick, histogram) in per_tick.iter().enumerate() {
        let time = format_float(tick as f64 * params.time_tick, hexfloat);
        for (state, count) in ranked(histogram) {
            let _ = writeln!(
                trajectory_probability,
                "{}\t{}\t{}",
                time,
                network.format_state(state),
                proba(count)
            );
        }
    }

    let mut stationary_distribution = String::from("State\tProba\n");
    for (state, count) in ranked(&finals) {
        let _ = writeln!(
            stationary_distribution,
            "{}\t{}",
            network.format_state(state),
            proba(count)
        );
    }

    let fixed_points = render_fixed_points(network, &finals, &proba);

    let mut run_log = String::new();
    let _ = writeln!(run_log, "maboss-rpc reference engine");
    let _ = writeln!(run_log, "nodes: {}", network.names().join(", "));
    let _ = writeln!(run_log, "time_tick: {}", format_float(params.time_tick, hexfloat));
    let _ = writeln!(run_log, "max_time: {}", format_float(params.max_time, hexfloat));
    let _ = writeln!(run_log, "steps: {}", steps);
    let _ = writeln!(run_log, "sample_count: {}", params.sample_count);
    let _ = writeln!(run_log, "thread_count: {}", params.thread_count);
    let _ = writeln!(run_log, "discrete_time: {}", u8::from(params.discrete_time));
    let _ = writeln!(run_log, "seed_pseudorandom: {}", params.seed);
    let _ = writeln!(run_log, "final states: {}", finals.len());
    let _ = writeln!(run_log, "elapsed_ms: {}", started.elapsed().as_millis());

    Ok(Report {
        run_log,
        trajectory,
        trajectory_probability,
        stationary_distribution,
        fixed_points,
    })
}

fn initial_state(istate: &[f64], rng: &mut StdRng) -> u64 {
    istate.iter().enumerate().fold(0, |state, (i, &p)| {
        // Certain values do not consume randomness
        let active = if p >= 1.0 {
            true
        } else if p <= 0.0 {
            false
        } else {
            rng.random::<f64>() < p
        };
        if active {
            state | 1 << i
        } else {
            state
        }
    })
}

fn step(network: &Network, state: u64, discrete_time: bool, rng: &mut StdRng) -> u64 {
    if discrete_time {
        return network.next_state(state);
    }
    let unstable = network.unstable_nodes(state);
    if unstable.is_empty() {
        return state;
    }
    let flip = unstable[rng.random_range(0..unstable.len())];
    state ^ 1 << flip
}

/// States by descending count, ties by state value
fn ranked(histogram: &Histogram) -> Vec<(u64, usize)> {
    let mut entries: Vec<(u64, usize)> = histogram.iter().map(|(&s, &c)| (s, c)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries
}

fn render_fixed_points(
    network: &Network,
    finals: &Histogram,
    proba: &dyn Fn(usize) -> String,
) -> String {
    if network.len() > MAX_FIXED_POINT_NODES {
        return format!(
            "Fixed Points (not computed: {} nodes > {})\n",
            network.len(),
            MAX_FIXED_POINT_NODES
        );
    }

    let points: Vec<u64> = (0..1u64 << network.len())
        .filter(|&s| network.is_fixed_point(s))
        .collect();

    let mut out = format!("Fixed Points ({})\nFP\tProba\tState\n", points.len());
    for (n, state) in points.iter().enumerate() {
        let reached = finals.get(state).copied().unwrap_or(0);
        let _ = writeln!(
            out,
            "#{}\t{}\t{}",
            n + 1,
            proba(reached),
            network.format_state(*state)
        );
    }
    out
}
