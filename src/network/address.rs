//! Address Resolution
//!
//! Turns a `(host, port)` pair into a TCP or Unix-domain endpoint. An
//! all-digit port selects TCP; anything else is a socket path.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use crate::error::{Result, RpcError};

/// Only host accepted for Unix-domain endpoints
pub const LOCALHOST: &str = "localhost";

/// A resolved transport address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// IPv4 TCP socket
    Tcp(SocketAddr),

    /// Unix-domain socket path
    Unix(PathBuf),
}

impl Endpoint {
    /// Resolve `host` and `port` into an endpoint
    ///
    /// An empty or absent host resolves to this machine's hostname in TCP
    /// mode. In socket-path mode the host, if given, must be `localhost`.
    pub fn resolve(host: Option<&str>, port: &str) -> Result<Self> {
        let host = host.filter(|h| !h.is_empty());

        if port.is_empty() {
            return Err(RpcError::Config("port must not be empty".to_string()));
        }

        if !is_tcp_port(port) {
            return match host {
                None | Some(LOCALHOST) => Ok(Endpoint::Unix(PathBuf::from(port))),
                Some(other) => Err(RpcError::Config(format!(
                    "host must be {:?} when port is a socket path, got {:?}",
                    LOCALHOST, other
                ))),
            };
        }

        let port_number: u16 = port
            .parse()
            .map_err(|_| RpcError::Config(format!("invalid TCP port {}", port)))?;

        let host = match host {
            Some(h) => h.to_string(),
            None => local_hostname()?,
        };

        let addr = (host.as_str(), port_number)
            .to_socket_addrs()
            .map_err(|e| RpcError::Resolve {
                host: host.clone(),
                reason: e.to_string(),
            })?
            .find(|a| a.is_ipv4())
            .ok_or_else(|| RpcError::Resolve {
                host: host.clone(),
                reason: "no IPv4 address".to_string(),
            })?;

        Ok(Endpoint::Tcp(addr))
    }

    pub fn is_unix(&self) -> bool {
        matches!(self, Endpoint::Unix(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Whether `port` names a TCP port rather than a socket path
pub fn is_tcp_port(port: &str) -> bool {
    !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
}

fn local_hostname() -> Result<String> {
    hostname::get()
        .map_err(|e| RpcError::Resolve {
            host: "<local hostname>".to_string(),
            reason: e.to_string(),
        })?
        .into_string()
        .map_err(|_| RpcError::Resolve {
            host: "<local hostname>".to_string(),
            reason: "hostname is not valid UTF-8".to_string(),
        })
}
