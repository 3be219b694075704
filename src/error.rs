//! Error types for the gateway.
//!
//! Decode-level errors (`ShortFrame`, `TruncatedFrame`, `Parse`) are
//! non-fatal: the owning reader skips the offending input and keeps going.
//! Session-level errors (`Stream`, `Serial`, `Auth`) terminate one
//! connection and are handled by the endpoint reconnect loops. `Config`
//! errors are fatal at startup only.

use std::io;
use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// AX.25 frame shorter than the minimum structural size
    #[error("short frame")]
    ShortFrame,

    /// AX.25 frame with path data but missing or wrong control/PID octets
    #[error("truncated frame")]
    TruncatedFrame,

    /// Malformed textual frame from the relay stream
    #[error("unparseable frame: {0}")]
    Parse(String),

    /// I/O failure on a serial or network stream
    #[error("stream error: {0}")]
    Stream(#[from] io::Error),

    /// Serial port errors (device not found, permission denied)
    #[error("serial port error on '{device}': {source}")]
    Serial {
        /// Path to the serial device
        device: String,
        /// Underlying serial error
        #[source]
        source: tokio_serial::Error,
    },

    /// APRS-IS rejected the supplied credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A single notification delivery attempt failed
    #[error("notification driver error: {0}")]
    Driver(String),

    /// Configuration-related errors (parsing, validation, missing files)
    #[error("configuration error: {0}")]
    Config(String),
}

/// Type alias for Results that use GateError
pub type Result<T> = std::result::Result<T, GateError>;

impl GateError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new serial error
    pub fn serial(device: impl Into<String>, source: tokio_serial::Error) -> Self {
        Self::Serial {
            device: device.into(),
            source,
        }
    }

    /// Create a new driver error
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// True for malformed-input errors that the reader should skip over
    /// rather than tear the session down.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::ShortFrame | Self::TruncatedFrame | Self::Parse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_skippable() {
        assert!(GateError::ShortFrame.is_decode());
        assert!(GateError::TruncatedFrame.is_decode());
        assert!(GateError::Parse("junk".to_string()).is_decode());

        let io = GateError::Stream(io::Error::new(io::ErrorKind::TimedOut, "idle"));
        assert!(!io.is_decode());
        assert!(!GateError::Auth("unverified".to_string()).is_decode());
        assert!(!GateError::driver("boom").is_decode());
    }
}
