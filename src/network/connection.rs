//! Connection Handler
//!
//! Handles one client connection: read one request, answer it, close.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::Shutdown;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{CancelToken, Dispatcher};
use crate::error::{Result, RpcError};
use crate::protocol::{decode_request, encode_response, status, ServerData};
use super::framing::{read_framed_message, write_framed_message, READ_CHUNK_SIZE, TERMINATOR};
use super::Stream;

/// Handles a single client connection
pub struct Connection {
    /// Stream reader (buffered in framing-sized chunks)
    reader: BufReader<Stream>,

    /// Stream writer (buffered for efficiency)
    writer: BufWriter<Stream>,

    /// Runs decoded requests
    dispatcher: Arc<Dispatcher>,

    /// Cancelled when the server shuts down
    cancel: CancelToken,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(
        stream: Stream,
        peer_addr: String,
        dispatcher: Arc<Dispatcher>,
        cancel: CancelToken,
    ) -> Result<Self> {
        // The listener is non-blocking; handlers use blocking I/O
        stream.set_nonblocking(false)?;

        // Disable Nagle's algorithm for low latency (best-effort)
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!("Cannot set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::with_capacity(READ_CHUNK_SIZE, read_stream),
            writer: BufWriter::new(write_stream),
            dispatcher,
            cancel,
            peer_addr,
        })
    }

    /// Configure connection timeouts (`None` blocks forever)
    pub fn set_timeouts(&mut self, read: Option<Duration>, write: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(read)?;
        self.writer.get_ref().set_write_timeout(write)?;
        Ok(())
    }

    /// Handle the request on this connection (blocking until answered)
    ///
    /// Read, decode, dispatch, encode, write, close. A request that fails
    /// to decode is answered with the decode error's status.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let Some(raw) = self.read_request()? else {
            return Ok(());
        };

        let response = match decode_request(&raw) {
            Ok(request) => {
                tracing::debug!(
                    "Request from {}: command={} flags={:#x} network={}B configs={} exprs={}",
                    self.peer_addr,
                    request.command,
                    request.flags.bits(),
                    request.network.len(),
                    request.configs.len(),
                    request.config_exprs.len()
                );
                self.dispatcher.dispatch(request, &self.cancel)
            }
            Err(e) => {
                tracing::warn!("Bad request from {}: {}", self.peer_addr, e);
                ServerData::failure(e.code(), e.to_string())
            }
        };

        self.finish(&response)
    }

    /// Read the request and answer it with a fixed failure
    pub fn reject(&mut self, code: i32, message: &str) -> Result<()> {
        if self.read_request()?.is_none() {
            return Ok(());
        }
        self.finish(&ServerData::failure(code, message))
    }

    /// Read one framed request; `None` if the client went away
    fn read_request(&mut self) -> Result<Option<Vec<u8>>> {
        match read_framed_message(&mut self.reader) {
            Ok(raw) => {
                tracing::trace!("Received {} bytes from {}", raw.len(), self.peer_addr);
                Ok(Some(raw))
            }
            Err(RpcError::ConnectionClosed) => {
                tracing::debug!("Client {} disconnected before sending a request", self.peer_addr);
                Ok(None)
            }
            Err(RpcError::Io(ref e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                tracing::debug!("Read timeout for client {}", self.peer_addr);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    /// Send the response and close the connection
    fn finish(&mut self, response: &ServerData) -> Result<()> {
        let result = self.send_response(response);
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);

        match result {
            Err(RpcError::Io(ref e))
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
                ) =>
            {
                // The client gave up before the response was ready
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(())
            }
            other => other,
        }
    }

    fn send_response(&mut self, response: &ServerData) -> Result<()> {
        let mut bytes = encode_response(response);
        if bytes.contains(&TERMINATOR) {
            tracing::warn!("Response for {} contains a NUL byte", self.peer_addr);
            bytes = encode_response(&ServerData::failure(
                status::INTERNAL_ERROR,
                "response payload contains a NUL byte",
            ));
        }
        tracing::trace!(
            "Sending {} bytes (status={}) to {}",
            bytes.len(),
            response.status,
            self.peer_addr
        );
        write_framed_message(&mut self.writer, &bytes)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
