//! maboss-rpc Client Binary
//!
//! Sends a model and its configuration to a simulation server and writes
//! the returned results next to the given output prefix.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use maboss_rpc::{Client, ClientData, Command, Flags, ServerData};
use tracing_subscriber::{fmt, EnvFilter};

/// maboss-rpc Client
#[derive(Parser, Debug)]
#[command(name = "maboss-client")]
#[command(about = "Run or check a Boolean-network model on a simulation server")]
#[command(version)]
struct Args {
    /// Server host (omit for a Unix socket path in --port)
    #[arg(long)]
    host: Option<String>,

    /// TCP port number, or a Unix socket path
    #[arg(long)]
    port: String,

    /// Configuration file (repeatable)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    configs: Vec<PathBuf>,

    /// Inline configuration expression (repeatable)
    #[arg(short = 'e', long = "config-expr", value_name = "EXPR")]
    config_exprs: Vec<String>,

    /// Configuration variables VAR=VAL[,VAR2=VAL2] (repeatable)
    #[arg(short = 'v', long = "config-vars", value_name = "VARS")]
    config_vars: Vec<String>,

    /// Output file prefix
    #[arg(short = 'o', long, value_name = "PREFIX")]
    output: Option<String>,

    /// Only check model and configuration
    #[arg(long)]
    check: bool,

    /// Later node definitions replace earlier ones
    #[arg(long = "override", conflicts_with = "augment_nodes")]
    override_nodes: bool,

    /// Later node definitions are merged into earlier ones
    #[arg(long = "augment")]
    augment_nodes: bool,

    /// Print floats in hexadecimal notation
    #[arg(long)]
    hexfloat: bool,

    /// Debug logging to stderr
    #[arg(long)]
    verbose: bool,

    /// Response timeout in milliseconds (0 waits forever)
    #[arg(long, default_value = "0")]
    timeout_ms: u64,

    /// Model file
    model: PathBuf,
}

/// Result files by suffix
const OUTPUTS: [(&str, fn(&ServerData) -> &str); 5] = [
    ("traj.txt", |r| r.trajectory.as_str()),
    ("run.txt", |r| r.run_log.as_str()),
    ("probtraj.csv", |r| r.trajectory_probability.as_str()),
    ("statdist.csv", |r| r.stationary_distribution.as_str()),
    ("fp.csv", |r| r.fixed_points.as_str()),
];

fn main() -> ExitCode {
    let prog = std::env::args()
        .next()
        .and_then(|p| Path::new(&p).file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "maboss-client".to_string());

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    if args.verbose {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("maboss_rpc=debug"));
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    if !args.check && args.output.is_none() {
        eprintln!("{} error: -o/--output is required unless --check is given", prog);
        return ExitCode::FAILURE;
    }

    let request = match build_request(&args) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("{} error: {}", prog, message);
            return ExitCode::FAILURE;
        }
    };

    let timeout = (args.timeout_ms > 0).then(|| Duration::from_millis(args.timeout_ms));
    let client = Client::new(args.host.as_deref(), args.port.as_str()).with_timeout(timeout);

    let response = match client.send(&request) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{} error: {}", prog, e);
            return ExitCode::FAILURE;
        }
    };

    if !response.is_ok() {
        eprintln!(
            "{} error: [{}] [status={}]",
            prog, response.error_message, response.status
        );
        return ExitCode::FAILURE;
    }

    if let Some(prefix) = &args.output {
        if let Err(message) = write_outputs(prefix, &response) {
            eprintln!("{} error: {}", prog, message);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

/// Read the model and configuration files into a request
fn build_request(args: &Args) -> Result<ClientData, String> {
    let command = if args.check { Command::Check } else { Command::Run };

    let mut flags = Flags::NONE;
    if args.hexfloat {
        flags |= Flags::HEXFLOAT;
    }
    if args.override_nodes {
        flags |= Flags::OVERRIDE;
    }
    if args.augment_nodes {
        flags |= Flags::AUGMENT;
    }

    let mut request = ClientData::new(command)
        .with_flags(flags)
        .with_network(read_file(&args.model)?)
        .with_config_vars(args.config_vars.join(","));

    for path in &args.configs {
        request = request.with_config(read_file(path)?);
    }
    for expr in &args.config_exprs {
        request = request.with_config_expr(expr.as_str());
    }
    Ok(request)
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

/// Write each non-empty result field to `<prefix>_<suffix>`
fn write_outputs(prefix: &str, response: &ServerData) -> Result<(), String> {
    for (suffix, field) in OUTPUTS {
        let contents = field(response);
        if contents.is_empty() {
            continue;
        }
        let path = format!("{}_{}", prefix, suffix);
        std::fs::write(&path, contents).map_err(|e| format!("cannot write {}: {}", path, e))?;
        tracing::debug!("Wrote {}", path);
    }
    Ok(())
}
