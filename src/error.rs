//! Error types for maboss-rpc
//!
//! Provides a unified error type for transport and client operations, plus
//! the decode error carried back to peers as a response status.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using RpcError
pub type Result<T> = std::result::Result<T, RpcError>;

/// Unified error type for maboss-rpc operations
#[derive(Debug, Error)]
pub enum RpcError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Cannot resolve host {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("{phase} failed for {endpoint}: {source}")]
    Bind {
        phase: BindPhase,
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server unreachable at {host}:{port}: {source}")]
    ServerUnreachable {
        host: String,
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot write pid file {}: {source}", .path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Server startup phase that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindPhase {
    Socket,
    Bind,
    Listen,
}

impl std::fmt::Display for BindPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BindPhase::Socket => "socket",
            BindPhase::Bind => "bind",
            BindPhase::Listen => "listen",
        };
        f.write_str(name)
    }
}

/// Failure to decode a wire message
///
/// Each kind maps to a stable status code so peers can branch on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("magic token {0:?} not found")]
    MagicNotFound(&'static str),

    #[error("header/data separator not found")]
    SeparatorNotFound,

    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    #[error("unknown directive {0:?}")]
    UnknownDirective(String),

    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),

    #[error("invalid command {0:?}")]
    InvalidCommand(String),
}

impl DecodeError {
    /// Status code reported to the peer for this error
    pub fn code(&self) -> i32 {
        match self {
            DecodeError::MagicNotFound(_) => 1,
            DecodeError::SeparatorNotFound => 2,
            DecodeError::MalformedHeader(_) => 3,
            DecodeError::UnknownDirective(_) => 4,
            DecodeError::UnsupportedVersion(_) => 5,
            DecodeError::InvalidCommand(_) => 6,
        }
    }
}
