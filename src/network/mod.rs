//! Network Module
//!
//! Transport for the simulation protocol over TCP or Unix-domain sockets.
//!
//! ## Connection Model
//! - Each connection carries exactly one request and one response
//! - Messages are NUL-terminated (see [`framing`])
//! - The server runs one handler thread per connection; the engine itself
//!   runs on a job thread owned by that handler
//!
//! ## Addressing
//! An all-digit port selects TCP; any other port string is a Unix socket
//! path, in which case the host must be absent or `localhost`.

mod address;
mod client;
mod connection;
pub mod framing;
mod server;
mod stream;

pub use address::{is_tcp_port, Endpoint, LOCALHOST};
pub use client::Client;
pub use connection::Connection;
pub use framing::{
    read_framed_message, write_framed_message, MAX_MESSAGE_SIZE, READ_CHUNK_SIZE, TERMINATOR,
};
pub use server::{detach_stdio, Server, ServerState};
pub use stream::{Listener, Stream, LISTEN_BACKLOG};
