//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! Encoding appends every payload to a single data section and records its
//! inclusive byte range in the header. Decoding is strict: an unknown
//! directive fails the whole message instead of being skipped.

use crate::error::DecodeError;
use super::directive;
use super::escape::{escape_newlines, unescape_newlines};
use super::{ClientData, Command, Flags, ServerData, MAGIC, PROTOCOL_VERSION, RETURN_MAGIC};

/// Separator appended to every configuration expression
const EXPR_SEPARATOR: u8 = b';';

// =============================================================================
// Message Builder
// =============================================================================

/// Accumulates header lines and the data section of one message
struct MessageBuilder {
    header: String,
    data: Vec<u8>,
}

impl MessageBuilder {
    fn new(magic: &str) -> Self {
        let mut header = String::with_capacity(128);
        header.push_str(magic);
        header.push('\n');
        Self {
            header,
            data: Vec::new(),
        }
    }

    fn scalar(&mut self, directive: &str, value: &str) {
        self.header.push_str(directive);
        self.header.push_str(value);
        self.header.push('\n');
    }

    /// Append a payload and its range directive; empty payloads are omitted
    fn range(&mut self, directive: &str, parts: &[&[u8]]) {
        let len: usize = parts.iter().map(|p| p.len()).sum();
        if len == 0 {
            return;
        }
        let from = self.data.len();
        for part in parts {
            self.data.extend_from_slice(part);
        }
        let to = self.data.len() - 1;
        self.header.push_str(directive);
        self.header.push_str(&format!("{}-{}\n", from, to));
    }

    fn finish(self) -> Vec<u8> {
        let mut message = Vec::with_capacity(self.header.len() + 1 + self.data.len());
        message.extend_from_slice(self.header.as_bytes());
        message.push(b'\n');
        message.extend_from_slice(&self.data);
        message
    }
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &ClientData) -> Vec<u8> {
    let mut builder = MessageBuilder::new(MAGIC);
    builder.scalar(directive::PROTOCOL_VERSION, &request.protocol_version);
    builder.scalar(directive::FLAGS, &request.flags.bits().to_string());
    builder.scalar(directive::COMMAND, request.command.as_str());

    for config in &request.configs {
        builder.range(directive::CONFIGURATION, &[config.as_bytes()]);
    }
    for expr in request.config_exprs.iter().filter(|e| !e.is_empty()) {
        builder.range(
            directive::CONFIGURATION_EXPRESSIONS,
            &[expr.as_bytes(), std::slice::from_ref(&EXPR_SEPARATOR)],
        );
    }
    builder.range(directive::CONFIGURATION_VARIABLES, &[request.config_vars.as_bytes()]);
    builder.range(directive::NETWORK, &[request.network.as_bytes()]);

    builder.finish()
}

/// Decode a request from bytes
///
/// Fails with [`DecodeError::UnsupportedVersion`] unless the message speaks
/// [`PROTOCOL_VERSION`].
pub fn decode_request(bytes: &[u8]) -> Result<ClientData, DecodeError> {
    let message = RawMessage::parse(bytes, MAGIC)?;

    let mut request = ClientData::default();
    request.protocol_version.clear();
    let mut command: Option<Command> = None;

    for item in &message.items {
        match (item.directive, &item.value) {
            (directive::PROTOCOL_VERSION, Value::Scalar(v)) => {
                request.protocol_version = v.to_string();
            }
            (directive::FLAGS, Value::Scalar(v)) => {
                let bits = v.trim().parse::<u64>().map_err(|_| {
                    DecodeError::MalformedHeader(format!("{}{}", item.directive, v))
                })?;
                request.flags = Flags::from_bits(bits);
            }
            (directive::COMMAND, Value::Scalar(v)) => {
                command = Some(v.trim().parse()?);
            }
            (directive::NETWORK, Value::Range { .. }) => {
                request.network = message.text(item)?;
            }
            (directive::CONFIGURATION, Value::Range { .. }) => {
                request.configs.push(message.text(item)?);
            }
            (directive::CONFIGURATION_EXPRESSIONS, Value::Range { .. }) => {
                let mut expr = message.text(item)?;
                if expr.as_bytes().last() == Some(&EXPR_SEPARATOR) {
                    expr.pop();
                }
                request.config_exprs.push(expr);
            }
            (directive::CONFIGURATION_VARIABLES, Value::Range { .. }) => {
                request.config_vars = message.text(item)?;
            }
            (other, _) => return Err(DecodeError::UnknownDirective(other.to_string())),
        }
    }

    if request.protocol_version != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion(request.protocol_version));
    }
    request.command = command.ok_or_else(|| DecodeError::InvalidCommand(String::new()))?;

    Ok(request)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// A failed response carries its status and message only; result blobs are
/// dropped even when populated.
pub fn encode_response(response: &ServerData) -> Vec<u8> {
    let mut builder = MessageBuilder::new(RETURN_MAGIC);
    builder.scalar(directive::STATUS, &response.status.to_string());

    if response.status != super::status::OK {
        builder.scalar(directive::ERROR_MESSAGE, &escape_newlines(&response.error_message));
        return builder.finish();
    }

    builder.range(directive::TRAJECTORIES, &[response.trajectory.as_bytes()]);
    builder.range(
        directive::STATIONARY_DISTRIBUTION,
        &[response.stationary_distribution.as_bytes()],
    );
    builder.range(
        directive::TRAJECTORY_PROBABILITY,
        &[response.trajectory_probability.as_bytes()],
    );
    builder.range(directive::FIXED_POINTS, &[response.fixed_points.as_bytes()]);
    builder.range(directive::RUN_LOG, &[response.run_log.as_bytes()]);

    builder.finish()
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<ServerData, DecodeError> {
    let message = RawMessage::parse(bytes, RETURN_MAGIC)?;
    let mut response = ServerData::default();

    for item in &message.items {
        match (item.directive, &item.value) {
            (directive::STATUS, Value::Scalar(v)) => {
                response.status = v.trim().parse::<i32>().map_err(|_| {
                    DecodeError::MalformedHeader(format!("{}{}", item.directive, v))
                })?;
            }
            (directive::ERROR_MESSAGE, Value::Scalar(v)) => {
                response.error_message = unescape_newlines(v);
            }
            (directive::TRAJECTORIES, Value::Range { .. }) => {
                response.trajectory = message.text(item)?;
            }
            (directive::STATIONARY_DISTRIBUTION, Value::Range { .. }) => {
                response.stationary_distribution = message.text(item)?;
            }
            (directive::TRAJECTORY_PROBABILITY, Value::Range { .. }) => {
                response.trajectory_probability = message.text(item)?;
            }
            (directive::FIXED_POINTS, Value::Range { .. }) => {
                response.fixed_points = message.text(item)?;
            }
            (directive::RUN_LOG, Value::Range { .. }) => {
                response.run_log = message.text(item)?;
            }
            (other, _) => return Err(DecodeError::UnknownDirective(other.to_string())),
        }
    }

    Ok(response)
}

// =============================================================================
// Header Parsing
// =============================================================================

/// Value of one header line
#[derive(Debug, PartialEq, Eq)]
enum Value<'a> {
    Scalar(&'a str),
    /// Inclusive byte range into the data section
    Range { from: usize, to: usize },
}

#[derive(Debug)]
struct HeaderItem<'a> {
    /// Directive token, trailing colon included
    directive: &'a str,
    value: Value<'a>,
}

/// A message split into parsed header items and its data section
struct RawMessage<'a> {
    items: Vec<HeaderItem<'a>>,
    data: &'a [u8],
}

impl<'a> RawMessage<'a> {
    fn parse(bytes: &'a [u8], magic: &'static str) -> Result<Self, DecodeError> {
        let magic_pos =
            find(bytes, magic.as_bytes(), 0).ok_or(DecodeError::MagicNotFound(magic))?;
        let separator = find(bytes, b"\n\n", magic_pos).ok_or(DecodeError::SeparatorNotFound)?;

        // The magic line ends at or before the separator's first newline
        let magic_line_end = find(bytes, b"\n", magic_pos).unwrap_or(separator);
        let header_bytes = &bytes[magic_line_end + 1..separator + 1];
        let data = &bytes[separator + 2..];

        let header = std::str::from_utf8(header_bytes)
            .map_err(|e| DecodeError::MalformedHeader(format!("header is not UTF-8: {}", e)))?;

        let items = header
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(parse_header_line)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { items, data })
    }

    /// Slice the bytes a range directive points at
    fn slice(&self, item: &HeaderItem<'_>) -> Result<&'a [u8], DecodeError> {
        match item.value {
            Value::Range { from, to } if to < self.data.len() => Ok(&self.data[from..=to]),
            Value::Range { from, to } => Err(DecodeError::MalformedHeader(format!(
                "{}{}-{} exceeds data section of {} bytes",
                item.directive,
                from,
                to,
                self.data.len()
            ))),
            Value::Scalar(v) => Err(DecodeError::MalformedHeader(format!(
                "{}{} is not a byte range",
                item.directive, v
            ))),
        }
    }

    fn text(&self, item: &HeaderItem<'_>) -> Result<String, DecodeError> {
        let bytes = self.slice(item)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            DecodeError::MalformedHeader(format!("{} payload is not UTF-8", item.directive))
        })
    }
}

/// Split `Directive:value` and, for range directives, `from-to`
fn parse_header_line(line: &str) -> Result<HeaderItem<'_>, DecodeError> {
    let colon = line
        .find(':')
        .ok_or_else(|| DecodeError::MalformedHeader(line.to_string()))?;
    let directive = &line[..=colon];
    let value = &line[colon + 1..];

    if !directive::is_known(directive) {
        return Err(DecodeError::UnknownDirective(directive.to_string()));
    }
    if directive::is_scalar(directive) {
        return Ok(HeaderItem {
            directive,
            value: Value::Scalar(value),
        });
    }

    let (from, to) = value
        .split_once('-')
        .ok_or_else(|| DecodeError::MalformedHeader(line.to_string()))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| DecodeError::MalformedHeader(line.to_string()))
    };
    let (from, to) = (parse(from)?, parse(to)?);
    if to < from {
        return Err(DecodeError::MalformedHeader(line.to_string()));
    }

    Ok(HeaderItem {
        directive,
        value: Value::Range { from, to },
    })
}

/// Find `needle` in `haystack` at or after `start`
fn find(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if start > haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + start)
}
