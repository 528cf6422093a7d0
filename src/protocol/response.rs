//! Response definitions
//!
//! Represents the result (or failure) of one simulation request.

/// Response status codes
///
/// Codes 1-6 are decode failures and match
/// [`DecodeError::code`](crate::error::DecodeError::code).
pub mod status {
    pub const OK: i32 = 0;
    pub const ENGINE_FAILURE: i32 = 10;
    pub const UNSUPPORTED_COMMAND: i32 = 11;
    pub const RUN_TIMEOUT: i32 = 12;
    pub const INTERNAL_ERROR: i32 = 13;
    pub const SERVER_BUSY: i32 = 14;
}

/// A simulation response
///
/// Result blobs are only meaningful when `status == 0`; a failed response
/// never carries them on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerData {
    /// 0 on success
    pub status: i32,

    /// Set iff `status != 0`
    pub error_message: String,

    pub trajectory: String,
    pub stationary_distribution: String,
    pub trajectory_probability: String,
    pub fixed_points: String,
    pub run_log: String,
}

impl ServerData {
    /// Create an empty successful response
    pub fn ok() -> Self {
        Self::default()
    }

    /// Create a failed response
    pub fn failure(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            error_message: message.into(),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }
}
