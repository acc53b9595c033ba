//! Error handling for mpyfs
//!
//! Provides error types for every layer of a device operation:
//! - Connection errors (opening the serial port)
//! - Transport errors (byte I/O failing after the port was opened)
//! - Protocol errors (raw REPL framing, markers, payload decoding)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Raised while acquiring the serial port, before any raw-mode handshake
/// has been attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// The operating system refused access to the port
    #[error("Permission denied opening port {port}")]
    PermissionDenied {
        /// The name of the port.
        port: String,
    },

    /// Port is already in use
    #[error("Port already in use: {port}")]
    PortInUse {
        /// The name of the port that is in use.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Transport error type
///
/// A read or write failed mid-operation on an already opened port.
/// The core never retries these; the caller decides whether to rerun
/// the whole operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Reading from the port failed
    #[error("serial-read-failed: {reason}")]
    ReadFailed {
        /// The underlying I/O failure.
        reason: String,
    },

    /// Writing to the port failed
    #[error("serial-write-failed: {reason}")]
    WriteFailed {
        /// The underlying I/O failure.
        reason: String,
    },

    /// The port was used after it had been closed
    #[error("serial port {port} is closed")]
    Closed {
        /// The name of the closed port.
        port: String,
    },
}

/// Protocol error type
///
/// Raised by the raw REPL layer and by the typed operations built on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The marker deadline elapsed without a complete marker frame
    #[error("No response marker within {timeout_ms}ms")]
    Timeout {
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The response did not contain a marker frame
    #[error("Response did not contain a result payload")]
    NoPayload,

    /// Markers were found but the payload inside did not decode
    #[error("Corrupt payload: {reason}")]
    CorruptPayload {
        /// Why decoding failed.
        reason: String,
    },

    /// An operation that must be confirmed by the device was not
    #[error("Device did not confirm {operation}")]
    MissingConfirmation {
        /// The operation name.
        operation: String,
    },

    /// The snippet ran and reported a failure of its own
    #[error("{operation} failed on device: {message}")]
    DeviceReported {
        /// The operation name.
        operation: String,
        /// The message reported by the device.
        message: String,
    },

    /// Invalid raw REPL state transition
    #[error("Invalid raw REPL transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The current state name.
        current: String,
        /// The requested state name.
        requested: String,
    },
}

/// Main error type for mpyfs
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error on the host side (local files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Protocol(ProtocolError::Timeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a mid-session serial I/O failure
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// One-line, actionable description suitable for end users
    pub fn guidance(&self) -> String {
        match self {
            Error::Connection(ConnectionError::PortNotFound { .. }) => {
                "Serial port not found. Select the correct port.".to_string()
            }
            Error::Connection(ConnectionError::PermissionDenied { .. }) => {
                "Permission denied opening serial port. Close other tools and/or adjust permissions."
                    .to_string()
            }
            Error::Connection(ConnectionError::PortInUse { .. }) => {
                "Serial port busy. Close other serial monitors (Arduino, Thonny, miniterm)."
                    .to_string()
            }
            Error::Connection(ConnectionError::FailedToOpen { .. }) => {
                "Serial device not available. Reconnect the board or check the cable.".to_string()
            }
            Error::Connection(ConnectionError::InvalidParameters { reason }) => {
                format!("Invalid connection settings: {}", reason)
            }
            Error::Transport(TransportError::Closed { .. }) => {
                "Serial port was closed during the operation.".to_string()
            }
            Error::Transport(_) => {
                "Serial I/O failed. Device disconnected or port used by another program."
                    .to_string()
            }
            Error::Protocol(ProtocolError::Timeout { .. }) => {
                "Board did not answer in time. Press reset on the board and retry.".to_string()
            }
            Error::Protocol(e) => e.to_string(),
            Error::Io(e) => format!("Local file error: {}", e),
            Error::Other(msg) => msg.clone(),
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err: Error = ConnectionError::PortInUse {
            port: "/dev/ttyUSB0".into(),
        }
        .into();
        assert!(err.is_connection_error());
        assert!(!err.is_transient());

        let err: Error = TransportError::ReadFailed {
            reason: "device reports readiness to read but returned no data".into(),
        }
        .into();
        assert!(err.is_transient());
        assert!(err.to_string().starts_with("serial-read-failed"));

        let err: Error = ProtocolError::Timeout { timeout_ms: 8000 }.into();
        assert!(err.is_timeout());
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_guidance_is_single_line() {
        let errors: Vec<Error> = vec![
            ConnectionError::PortNotFound { port: "COM7".into() }.into(),
            ConnectionError::PermissionDenied { port: "COM7".into() }.into(),
            ConnectionError::PortInUse { port: "COM7".into() }.into(),
            TransportError::WriteFailed { reason: "broken pipe".into() }.into(),
            ProtocolError::NoPayload.into(),
        ];

        for err in errors {
            let msg = err.guidance();
            assert!(!msg.is_empty());
            assert!(!msg.contains('\n'));
        }
    }
}
