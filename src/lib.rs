//! # maboss-rpc
//!
//! Client/server plumbing for remote Boolean-network simulations:
//! - A text wire protocol with byte-range payload directives
//! - NUL-terminated framing over TCP or Unix-domain sockets
//! - A threaded server that runs each request through a pluggable engine
//! - A built-in reference engine for asynchronous Boolean networks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   maboss-client (CLI)                        │
//! │        files ──► ClientData ──► encode ──► frame             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  TCP / Unix socket, one request each
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Server                                  │
//! │        accept loop ──► handler thread per connection         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Dispatcher                                │
//! │   temp files ──► load ──► configure ──► check ──► run        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!              ┌──────────────────┐
//!              │ SimulationEngine │
//!              │    (boolnet)     │
//!              └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DecodeError, Result, RpcError};
pub use config::Config;
pub use network::{Client, Server};
pub use protocol::{ClientData, Command, Flags, ServerData};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of maboss-rpc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
