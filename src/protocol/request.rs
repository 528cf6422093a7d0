//! Request definitions
//!
//! Represents one simulation invocation sent by a client.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::DecodeError;
use super::PROTOCOL_VERSION;

/// Command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Parse, configure and run the simulation
    #[default]
    Run,

    /// Parse and configure only
    Check,

    /// Reserved; accepted on the wire, never dispatched
    Parse,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Run => "run",
            Command::Check => "check",
            Command::Parse => "parse",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(Command::Run),
            "check" => Ok(Command::Check),
            "parse" => Ok(Command::Parse),
            other => Err(DecodeError::InvalidCommand(other.to_string())),
        }
    }
}

/// Request flag bitset
///
/// Bits are independent on the wire; OVERRIDE together with AUGMENT is
/// rejected by the engine, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Flags(u64);

impl Flags {
    pub const NONE: Flags = Flags(0);

    /// Print floats in hexadecimal notation
    pub const HEXFLOAT: Flags = Flags(0x1);

    /// New node definitions replace prior ones
    pub const OVERRIDE: Flags = Flags(0x2);

    /// New node definitions extend prior ones
    pub const AUGMENT: Flags = Flags(0x4);

    pub const fn from_bits(bits: u64) -> Self {
        Flags(bits)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn contains(&self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.insert(rhs);
    }
}

/// A simulation request
///
/// `configs` are applied in order, then `config_exprs` in order;
/// `config_vars` (`VAR=VALUE,...`) takes precedence over both.
/// Empty list entries carry no bytes and do not survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientData {
    /// Wire-format version tag
    pub protocol_version: String,

    /// Request flags
    pub flags: Flags,

    /// Command verb
    pub command: Command,

    /// Full text of the model definition
    pub network: String,

    /// Full texts of configuration files
    pub configs: Vec<String>,

    /// Inline configuration expressions
    pub config_exprs: Vec<String>,

    /// Comma-separated `VAR=VALUE` overrides
    pub config_vars: String,
}

impl ClientData {
    /// Create a request for `command` speaking the current protocol version
    pub fn new(command: Command) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            flags: Flags::NONE,
            command,
            network: String::new(),
            configs: Vec::new(),
            config_exprs: Vec::new(),
            config_vars: String::new(),
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.configs.push(config.into());
        self
    }

    pub fn with_config_expr(mut self, expr: impl Into<String>) -> Self {
        self.config_exprs.push(expr.into());
        self
    }

    pub fn with_config_vars(mut self, vars: impl Into<String>) -> Self {
        self.config_vars = vars.into();
        self
    }
}

impl Default for ClientData {
    fn default() -> Self {
        Self::new(Command::Run)
    }
}
