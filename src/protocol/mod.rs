//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Message Format
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ MaBoSS-2.0\n               (magic line)      │
//! │ Protocol-Version:1.0\n     (scalar)          │
//! │ Flags:3\n                  (scalar)          │
//! │ Command:run\n              (scalar)          │
//! │ Network:0-8\n              (byte range)      │
//! │ \n                         (end of header)   │
//! ├──────────────────────────────────────────────┤
//! │ A = TRUE;                  (raw data)        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Responses start with `RETURN MaBoSS-2.0`. Range directives carry an
//! inclusive `from-to` byte range into the data section, so payloads are
//! never escaped. Fields with no bytes are omitted from the header.
//!
//! ### Status Codes
//! - 0: OK
//! - 1-6: decode failures (see [`DecodeError::code`](crate::error::DecodeError::code))
//! - 10: engine failure
//! - 11: unsupported command
//! - 12: run timed out
//! - 13: internal handler failure
//! - 14: server busy

mod request;
mod response;
mod escape;
mod codec;

pub use request::{ClientData, Command, Flags};
pub use response::{status, ServerData};
pub use escape::{escape_newlines, unescape_newlines, NL_SENTINEL};
pub use codec::{decode_request, decode_response, encode_request, encode_response};

/// Magic token opening every message
pub const MAGIC: &str = "MaBoSS-2.0";

/// Magic line of response messages
pub const RETURN_MAGIC: &str = "RETURN MaBoSS-2.0";

/// Protocol version spoken by this crate
pub const PROTOCOL_VERSION: &str = "1.0";

/// Header directive tokens (colon included)
pub mod directive {
    pub const PROTOCOL_VERSION: &str = "Protocol-Version:";
    pub const FLAGS: &str = "Flags:";
    pub const COMMAND: &str = "Command:";
    pub const NETWORK: &str = "Network:";
    pub const CONFIGURATION: &str = "Configuration:";
    pub const CONFIGURATION_EXPRESSIONS: &str = "Configuration-Expressions:";
    pub const CONFIGURATION_VARIABLES: &str = "Configuration-Variables:";

    pub const STATUS: &str = "Status:";
    pub const ERROR_MESSAGE: &str = "Error-Message:";
    pub const STATIONARY_DISTRIBUTION: &str = "Stationary-Distribution:";
    pub const TRAJECTORY_PROBABILITY: &str = "Trajectory-Probability:";
    pub const TRAJECTORIES: &str = "Trajectories:";
    pub const FIXED_POINTS: &str = "Fixed-Points:";
    pub const RUN_LOG: &str = "Run-Log:";

    /// Directives whose value is carried inline instead of as a byte range
    pub const SCALAR: [&str; 5] = [PROTOCOL_VERSION, FLAGS, COMMAND, STATUS, ERROR_MESSAGE];

    /// Every directive either side may send
    pub const KNOWN: [&str; 14] = [
        PROTOCOL_VERSION,
        FLAGS,
        COMMAND,
        NETWORK,
        CONFIGURATION,
        CONFIGURATION_EXPRESSIONS,
        CONFIGURATION_VARIABLES,
        STATUS,
        ERROR_MESSAGE,
        STATIONARY_DISTRIBUTION,
        TRAJECTORY_PROBABILITY,
        TRAJECTORIES,
        FIXED_POINTS,
        RUN_LOG,
    ];

    pub fn is_scalar(directive: &str) -> bool {
        SCALAR.contains(&directive)
    }

    pub fn is_known(directive: &str) -> bool {
        KNOWN.contains(&directive)
    }
}
