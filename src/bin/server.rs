//! maboss-rpc Server Binary
//!
//! Serves simulation requests with the built-in Boolean-network engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use maboss_rpc::engine::boolnet::BoolNetEngine;
use maboss_rpc::network::{detach_stdio, Server};
use maboss_rpc::Config;
use tracing_subscriber::{fmt, EnvFilter};

/// maboss-rpc Server
#[derive(Parser, Debug)]
#[command(name = "maboss-server")]
#[command(about = "Simulation server for remote Boolean-network runs")]
#[command(version)]
struct Args {
    /// Host to bind (defaults to this machine's hostname in TCP mode)
    #[arg(long)]
    host: Option<String>,

    /// TCP port number, or a Unix socket path
    #[arg(long)]
    port: String,

    /// Write the server pid to this file
    #[arg(long)]
    pidfile: Option<PathBuf>,

    /// Detach stdin, stdout and stderr after startup
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Debug logging
    #[arg(long)]
    verbose: bool,

    /// Maximum concurrent requests
    #[arg(long, default_value = "64")]
    max_connections: usize,

    /// Request read timeout in milliseconds (0 waits forever)
    #[arg(long, default_value = "30000")]
    read_timeout_ms: u64,

    /// Wall-clock cap on a single run in milliseconds (0 is unlimited)
    #[arg(long, default_value = "0")]
    max_run_time_ms: u64,

    /// Directory for per-request temp files
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.verbose {
        "info,maboss_rpc=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("maboss-rpc server v{}", maboss_rpc::VERSION);

    // Build config from args
    let mut builder = Config::builder()
        .port(&args.port)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .max_run_time_ms(args.max_run_time_ms)
        .quiet(args.quiet);
    if let Some(host) = &args.host {
        builder = builder.host(host);
    }
    if let Some(pidfile) = &args.pidfile {
        builder = builder.pidfile(pidfile);
    }
    if let Some(dir) = &args.work_dir {
        builder = builder.work_dir(dir);
    }
    let config = builder.build();
    let quiet = config.quiet;

    let mut server = match Server::bind(config, Arc::new(BoolNetEngine::new())) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.install_signal_handlers() {
        tracing::error!("Failed to install signal handlers: {}", e);
        std::process::exit(1);
    }

    if quiet {
        if let Err(e) = detach_stdio() {
            tracing::warn!("Cannot detach stdio: {}", e);
        }
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        drop(server);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
