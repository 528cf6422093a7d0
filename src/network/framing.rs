//! Message Framing
//!
//! Every message travels as its bytes followed by a single `0x00`
//! terminator. Encoded messages never contain NUL, so the terminator is
//! unambiguous; the writer refuses messages that would break that.
//!
//! ```text
//! ┌─────────────────────────────┬──────┐
//! │  Message (any length)       │ 0x00 │
//! └─────────────────────────────┴──────┘
//! ```

use std::io::{BufRead, ErrorKind, Write};

use crate::error::{Result, RpcError};

/// Frame terminator
pub const TERMINATOR: u8 = 0x00;

/// Read buffer size; wrap streams in a `BufReader` of this capacity
pub const READ_CHUNK_SIZE: usize = 4196;

/// Maximum accepted message size (256 MB)
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Write `message` followed by the terminator
pub fn write_framed_message<W: Write>(writer: &mut W, message: &[u8]) -> Result<()> {
    if let Some(pos) = message.iter().position(|&b| b == TERMINATOR) {
        return Err(RpcError::Protocol(format!(
            "message contains a NUL byte at offset {}",
            pos
        )));
    }
    writer.write_all(message)?;
    writer.write_all(&[TERMINATOR])?;
    writer.flush()?;
    Ok(())
}

/// Read one message up to its terminator
///
/// Returns the message without the terminator. If the peer closes after
/// sending some bytes, those bytes are returned as the message; closing
/// before any byte yields [`RpcError::ConnectionClosed`]. Bytes after the
/// terminator stay buffered in `reader` for the next call.
pub fn read_framed_message<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut message: Vec<u8> = Vec::with_capacity(READ_CHUNK_SIZE);

    loop {
        let chunk = match reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if chunk.is_empty() {
            if message.is_empty() {
                return Err(RpcError::ConnectionClosed);
            }
            tracing::debug!("Peer closed before terminator after {} bytes", message.len());
            return Ok(message);
        }

        let (take, terminated) = match chunk.iter().position(|&b| b == TERMINATOR) {
            Some(pos) => (pos, true),
            None => (chunk.len(), false),
        };

        if message.len() + take > MAX_MESSAGE_SIZE {
            return Err(RpcError::Protocol(format!(
                "message exceeds {} bytes",
                MAX_MESSAGE_SIZE
            )));
        }

        // Grow by doubling so large messages need few reallocations
        let needed = message.len() + take;
        if needed > message.capacity() {
            let target = needed.max(message.capacity() * 2).min(MAX_MESSAGE_SIZE);
            message.reserve_exact(target - message.len());
        }
        message.extend_from_slice(&chunk[..take]);

        reader.consume(take + usize::from(terminated));
        if terminated {
            return Ok(message);
        }
    }
}
