//! Simulation Client
//!
//! One request per connection: connect, send, read the response, close.

use std::io::{self, BufReader, ErrorKind};
use std::net::Shutdown;
use std::time::Duration;

use crate::error::{Result, RpcError};
use crate::protocol::{decode_response, encode_request, ClientData, ServerData};
use super::framing::{read_framed_message, write_framed_message, READ_CHUNK_SIZE};
use super::{Endpoint, Stream, LOCALHOST};

/// Client for a simulation server
#[derive(Debug, Clone)]
pub struct Client {
    /// `None` selects a Unix socket when `port` is a path, else localhost
    host: Option<String>,

    /// TCP port number or Unix socket path
    port: String,

    /// Read and write timeout (`None` waits forever)
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(host: Option<&str>, port: impl Into<String>) -> Self {
        Self {
            host: host.map(str::to_string),
            port: port.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect to the server
    ///
    /// Resolution and connect failures are both reported as
    /// [`RpcError::ServerUnreachable`].
    pub fn open(&self) -> Result<Stream> {
        let unreachable = |source| RpcError::ServerUnreachable {
            host: self.host.clone().unwrap_or_else(|| LOCALHOST.to_string()),
            port: self.port.clone(),
            source,
        };

        let endpoint = Endpoint::resolve(self.host.as_deref(), &self.port)
            .map_err(|e| unreachable(io::Error::new(ErrorKind::NotFound, e.to_string())))?;
        let stream = Stream::connect(&endpoint).map_err(unreachable)?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        tracing::debug!("Connected to {}", endpoint);
        Ok(stream)
    }

    /// Send a request and wait for its response
    pub fn send(&self, request: &ClientData) -> Result<ServerData> {
        let stream = self.open()?;
        let mut writer = stream.try_clone()?;

        let bytes = encode_request(request);
        tracing::trace!("Sending {} bytes", bytes.len());
        write_framed_message(&mut writer, &bytes)?;

        let mut reader = BufReader::with_capacity(READ_CHUNK_SIZE, stream);
        let raw = read_framed_message(&mut reader)?;
        tracing::trace!("Received {} bytes", raw.len());
        let _ = reader.get_ref().shutdown(Shutdown::Both);

        Ok(decode_response(&raw)?)
    }
}
