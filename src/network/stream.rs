//! Socket Wrappers
//!
//! One listener and one stream type covering both TCP and Unix-domain
//! sockets, so the server and client never branch on the transport.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::time::Duration;

use crate::error::{BindPhase, Result, RpcError};
use super::Endpoint;

/// Pending-connection backlog; handlers are spawned right after accept
pub const LISTEN_BACKLOG: i32 = 2;

/// Mode applied to Unix socket files so other users can connect
const SOCKET_MODE: u32 = 0o777;

// =============================================================================
// Listener
// =============================================================================

/// A bound, listening socket
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    /// Bind and listen on `endpoint`
    ///
    /// A stale Unix socket file (nobody accepting on it) is removed first.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let bind_error = |phase, source| RpcError::Bind {
            phase,
            endpoint: endpoint.to_string(),
            source,
        };

        let listener = match endpoint {
            Endpoint::Tcp(addr) => {
                // std sets SO_REUSEADDR before binding on Unix platforms
                let listener =
                    TcpListener::bind(addr).map_err(|e| bind_error(BindPhase::Bind, e))?;
                Listener::Tcp(listener)
            }
            Endpoint::Unix(path) => {
                remove_stale_socket(path).map_err(|e| bind_error(BindPhase::Socket, e))?;
                let listener =
                    UnixListener::bind(path).map_err(|e| bind_error(BindPhase::Bind, e))?;
                if let Err(e) =
                    std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))
                {
                    tracing::warn!("Cannot chmod socket {}: {}", path.display(), e);
                }
                Listener::Unix(listener)
            }
        };

        listener
            .set_backlog(LISTEN_BACKLOG)
            .map_err(|e| bind_error(BindPhase::Listen, e))?;

        Ok(listener)
    }

    /// Re-issue `listen(2)` with the given backlog
    fn set_backlog(&self, backlog: i32) -> io::Result<()> {
        // SAFETY: the descriptor is owned by self and valid for this call
        let rc = unsafe { libc::listen(self.as_raw_fd(), backlog) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Accept one connection, returning it with a printable peer label
    pub fn accept(&self) -> io::Result<(Stream, String)> {
        match self {
            Listener::Tcp(l) => {
                let (stream, addr) = l.accept()?;
                Ok((Stream::Tcp(stream), addr.to_string()))
            }
            Listener::Unix(l) => {
                let (stream, _) = l.accept()?;
                Ok((Stream::Unix(stream), "unix-peer".to_string()))
            }
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Listener::Tcp(l) => l.set_nonblocking(nonblocking),
            Listener::Unix(l) => l.set_nonblocking(nonblocking),
        }
    }

    /// The endpoint actually bound (resolves TCP port 0)
    pub fn local_endpoint(&self) -> io::Result<Endpoint> {
        match self {
            Listener::Tcp(l) => Ok(Endpoint::Tcp(l.local_addr()?)),
            Listener::Unix(l) => l
                .local_addr()?
                .as_pathname()
                .map(|p| Endpoint::Unix(p.to_path_buf()))
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "unnamed unix socket")),
        }
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Listener::Tcp(l) => l.as_raw_fd(),
            Listener::Unix(l) => l.as_raw_fd(),
        }
    }
}

/// Unlink `path` if it is a socket file nobody is accepting on
///
/// Anything other than a socket is left alone and reported as in use.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a socket",
        ));
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            "a server is already listening on this socket",
        )),
        Err(_) => {
            tracing::debug!("Removing stale socket {}", path.display());
            std::fs::remove_file(path)
        }
    }
}

// =============================================================================
// Stream
// =============================================================================

/// A connected byte stream
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Stream {
    /// Connect to `endpoint`
    pub fn connect(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Stream::Tcp(TcpStream::connect(addr)?)),
            Endpoint::Unix(path) => Ok(Stream::Unix(UnixStream::connect(path)?)),
        }
    }

    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Stream::Tcp(s) => Ok(Stream::Tcp(s.try_clone()?)),
            Stream::Unix(s) => Ok(Stream::Unix(s.try_clone()?)),
        }
    }

    /// Disable Nagle's algorithm (no-op for Unix sockets)
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.set_nodelay(nodelay),
            Stream::Unix(_) => Ok(()),
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.set_nonblocking(nonblocking),
            Stream::Unix(s) => s.set_nonblocking(nonblocking),
        }
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.set_read_timeout(timeout),
            Stream::Unix(s) => s.set_read_timeout(timeout),
        }
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.set_write_timeout(timeout),
            Stream::Unix(s) => s.set_write_timeout(timeout),
        }
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.shutdown(how),
            Stream::Unix(s) => s.shutdown(how),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            Stream::Unix(s) => s.flush(),
        }
    }
}
