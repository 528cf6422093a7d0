//! Configuration for the simulation server
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Host to bind; `None` means the local hostname (TCP) or
    /// `localhost` (Unix socket)
    pub host: Option<String>,

    /// TCP port if all digits, Unix socket path otherwise
    pub port: String,

    /// Max concurrent request handlers
    pub max_connections: usize,

    /// Request read timeout (milliseconds, 0 disables)
    pub read_timeout_ms: u64,

    /// Response write timeout (milliseconds, 0 disables)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Engine Configuration
    // -------------------------------------------------------------------------
    /// Wall-clock cap on one engine run (milliseconds, 0 = unlimited)
    pub max_run_time_ms: u64,

    /// Directory holding per-request temp files
    /// Files are named:
    ///   {work_dir}/maboss-rpc_{nanos}_{pid}_{seq}_{name}
    pub work_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Process Configuration
    // -------------------------------------------------------------------------
    /// Pid file written after bind, removed on shutdown
    pub pidfile: Option<PathBuf>,

    /// Detach stdio after startup
    pub quiet: bool,

    /// How long shutdown waits for in-flight handlers (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: "7777".to_string(),
            max_connections: 64,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
            max_run_time_ms: 0,
            work_dir: std::env::temp_dir(),
            pidfile: None,
            quiet: false,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.write_timeout_ms)
    }

    pub fn max_run_time(&self) -> Option<Duration> {
        non_zero_millis(self.max_run_time_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the host to bind
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    /// Set the TCP port or Unix socket path
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.port = port.into();
        self
    }

    /// Set the maximum number of concurrent handlers
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the engine run cap (in milliseconds)
    pub fn max_run_time_ms(mut self, ms: u64) -> Self {
        self.config.max_run_time_ms = ms;
        self
    }

    /// Set the directory for per-request temp files
    pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.work_dir = path.into();
        self
    }

    /// Set the pid file path
    pub fn pidfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pidfile = Some(path.into());
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    /// Set the shutdown grace period (in milliseconds)
    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_grace_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
