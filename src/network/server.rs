//! Simulation Server
//!
//! Accepts connections and hands each one to its own handler thread.
//!
//! ## Lifecycle
//! ```text
//! INIT ──bind()──► BOUND ──run()──► LISTENING ──shutdown / fatal──► TERMINATED
//! ```
//! - INIT: engine initialization hook
//! - BOUND: socket bound, pid file written
//! - LISTENING: wait for readiness, accept, spawn a handler, repeat
//! - TERMINATED: in-flight runs cancelled and drained, pid file and socket
//!   path removed (on drop)

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::{CancelToken, Dispatcher, SimulationEngine};
use crate::error::{BindPhase, Result, RpcError};
use crate::protocol::status;
use super::{Connection, Endpoint, Listener, Stream};

/// How long one readiness wait lasts before the shutdown flag is checked
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Server lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Init,
    Bound,
    Listening,
    Terminated,
}

// =============================================================================
// Handler Registry
// =============================================================================

/// In-flight handlers and their cancellation tokens
#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, CancelToken>>,
}

impl Registry {
    fn register(self: &Arc<Self>) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        self.active.lock().insert(id, cancel.clone());
        Registration {
            registry: Arc::clone(self),
            id,
            cancel,
        }
    }

    fn len(&self) -> usize {
        self.active.lock().len()
    }

    fn cancel_all(&self) {
        for cancel in self.active.lock().values() {
            cancel.cancel();
        }
    }
}

/// Removes its handler from the registry when dropped, even on panic
struct Registration {
    registry: Arc<Registry>,
    id: u64,
    cancel: CancelToken,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.active.lock().remove(&self.id);
    }
}

/// Holds one of the slots for answering "server busy"
struct RejectSlot(Arc<AtomicUsize>);

impl RejectSlot {
    /// Take a slot unless `limit` are already taken
    fn acquire(counter: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1))
            .ok()
            .map(|_| RejectSlot(Arc::clone(counter)))
    }
}

impl Drop for RejectSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

// =============================================================================
// Server
// =============================================================================

/// Simulation server
pub struct Server {
    config: Config,

    /// Endpoint actually bound
    endpoint: Endpoint,

    listener: Listener,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<Registry>,

    /// Handlers currently answering "server busy"
    rejecting: Arc<AtomicUsize>,

    /// Set by signal handlers or [`Server::shutdown`]
    shutdown: Arc<AtomicBool>,

    state: ServerState,

    /// Pid file this server wrote
    pidfile: Option<PathBuf>,
}

impl Server {
    /// Initialize the engine, bind, and write the pid file
    pub fn bind(config: Config, engine: Arc<dyn SimulationEngine>) -> Result<Self> {
        tracing::debug!("Server state: {:?}", ServerState::Init);
        engine
            .init()
            .map_err(|e| RpcError::Config(format!("engine {} failed to initialize: {}", engine.name(), e)))?;

        let requested = Endpoint::resolve(config.host.as_deref(), &config.port)?;
        let listener = Listener::bind(&requested)?;
        let endpoint = listener.local_endpoint().unwrap_or(requested);

        // No Server exists yet to unlink the socket on drop
        let unbind = |err: RpcError| {
            if let Endpoint::Unix(path) = &endpoint {
                remove_quietly(path);
            }
            err
        };

        listener
            .set_nonblocking(true)
            .map_err(|source| RpcError::Bind {
                phase: BindPhase::Listen,
                endpoint: endpoint.to_string(),
                source,
            })
            .map_err(unbind)?;

        let pidfile = match &config.pidfile {
            Some(path) => {
                write_pidfile(path).map_err(unbind)?;
                Some(path.clone())
            }
            None => None,
        };

        let dispatcher = Dispatcher::new(engine, config.work_dir.clone())
            .with_max_run_time(config.max_run_time());

        tracing::info!("Bound to {}", endpoint);
        tracing::debug!("Server state: {:?}", ServerState::Bound);

        Ok(Self {
            config,
            endpoint,
            listener,
            dispatcher: Arc::new(dispatcher),
            registry: Arc::new(Registry::default()),
            rejecting: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            state: ServerState::Bound,
            pidfile,
        })
    }

    /// The endpoint clients should connect to
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Flag that stops [`Server::run`] once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Route SIGINT, SIGQUIT, SIGTERM and SIGHUP to the shutdown flag
    pub fn install_signal_handlers(&self) -> Result<()> {
        use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
        for signal in [SIGINT, SIGQUIT, SIGTERM, SIGHUP] {
            signal_hook::flag::register(signal, Arc::clone(&self.shutdown))?;
        }
        Ok(())
    }

    /// Number of requests currently being handled
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    /// Accept connections until shutdown (blocking)
    ///
    /// Returns `Ok` after a requested shutdown; a failed readiness wait is
    /// fatal.
    pub fn run(&mut self) -> Result<()> {
        self.state = ServerState::Listening;
        tracing::info!("Listening on {}", self.endpoint);

        let fd = self.listener.as_raw_fd();
        while !self.shutdown.load(Ordering::SeqCst) {
            match wait_readable(fd, POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("Readiness wait failed: {}", e);
                    self.state = ServerState::Terminated;
                    self.drain();
                    return Err(e.into());
                }
            }

            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_handler(stream, peer),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::ConnectionAborted
                    ) => {}
                Err(e) => {
                    // Typically descriptor exhaustion; back off and keep serving
                    tracing::error!("Accept failed: {}", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Shutdown requested, draining {} handlers", self.registry.len());
        self.drain();
        self.state = ServerState::Terminated;
        Ok(())
    }

    fn spawn_handler(&self, stream: Stream, peer: String) {
        let max_connections = self.config.max_connections;
        let busy = self.registry.len() >= max_connections;

        // Busy answers are bounded too; past that the connection is dropped
        let reject_slot = if busy {
            match RejectSlot::acquire(&self.rejecting, max_connections) {
                Some(slot) => Some(slot),
                None => {
                    tracing::warn!("Dropping {}: server busy and rejection backlog full", peer);
                    return;
                }
            }
        } else {
            None
        };

        let registration = (!busy).then(|| self.registry.register());
        let cancel = registration
            .as_ref()
            .map(|r| r.cancel.clone())
            .unwrap_or_default();

        let dispatcher = Arc::clone(&self.dispatcher);
        let read_timeout = self.config.read_timeout();
        let write_timeout = self.config.write_timeout();

        let spawned = thread::Builder::new()
            .name("maboss-conn".to_string())
            .spawn(move || {
                let _registration = registration;
                let _reject_slot = reject_slot;
                let mut connection = match Connection::new(stream, peer.clone(), dispatcher, cancel)
                {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!("Cannot set up connection from {}: {}", peer, e);
                        return;
                    }
                };
                if let Err(e) = connection.set_timeouts(read_timeout, write_timeout) {
                    tracing::warn!("Cannot set timeouts for {}: {}", peer, e);
                }

                let result = if busy {
                    tracing::warn!("Rejecting {}: {} handlers busy", peer, max_connections);
                    connection.reject(
                        status::SERVER_BUSY,
                        &format!("server busy: {} requests in flight", max_connections),
                    )
                } else {
                    connection.handle()
                };
                if let Err(e) = result {
                    tracing::warn!("Connection {} failed: {}", connection.peer_addr(), e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Cannot spawn handler thread: {}", e);
        }
    }

    /// Cancel in-flight runs and wait for their handlers to finish
    fn drain(&self) {
        self.registry.cancel_all();
        let deadline = Instant::now() + self.config.shutdown_grace();
        while self.registry.len() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        let left = self.registry.len();
        if left > 0 {
            tracing::warn!("{} handlers still running after shutdown grace period", left);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(path) = &self.pidfile {
            remove_quietly(path);
        }
        if let Endpoint::Unix(path) = &self.endpoint {
            remove_quietly(path);
        }
        tracing::debug!("Server state: {:?}", ServerState::Terminated);
    }
}

/// Block up to `timeout` for `fd` to become readable
fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    // SAFETY: pfd is a valid pollfd for the duration of the call
    let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
        return Err(io::Error::new(ErrorKind::Other, "listening socket is in error state"));
    }
    Ok(rc > 0 && pfd.revents & libc::POLLIN != 0)
}

/// Write the current pid followed by a newline
fn write_pidfile(path: &Path) -> Result<()> {
    std::fs::write(path, format!("{}\n", std::process::id())).map_err(|source| {
        RpcError::PidFile {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Cannot remove {}: {}", path.display(), e),
    }
}

/// Point stdin, stdout and stderr at `/dev/null`
pub fn detach_stdio() -> io::Result<()> {
    let devnull = OpenOptions::new().read(true).write(true).open("/dev/null")?;
    for fd in 0..=2 {
        // SAFETY: both descriptors are valid; dup2 atomically replaces fd
        if unsafe { libc::dup2(devnull.as_raw_fd(), fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
