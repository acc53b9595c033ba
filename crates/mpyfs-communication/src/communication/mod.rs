//! Serial transport
//!
//! A connection is described by [`ConnectionParams`] and opened through a
//! [`PortOpener`]. The opened [`SerialPort`] provides byte writes,
//! time-bounded reads and input flushing; nothing else of the physical
//! line is touched.

pub mod serial;
pub mod simulated;

use mpyfs_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};
use mpyfs_core::{ConnectionError, Result};
use std::time::Duration;

/// Connection descriptor
///
/// Immutable for the lifetime of one operation. The baud rate lives here
/// rather than in any global setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound of a single read call
    pub read_timeout: Duration,
}

impl ConnectionParams {
    /// Create parameters for a port with default baud rate and read timeout
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Check the parameters before any attempt to open the port
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(ConnectionError::InvalidParameters {
                reason: "no serial port given".to_string(),
            }
            .into());
        }

        if self.baud_rate == 0 {
            return Err(ConnectionError::InvalidParameters {
                reason: "baud rate must be > 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Low-level serial port interface
///
/// Reads never block longer than the read timeout of the connection and
/// return `Ok(0)` when nothing arrived. Failures after the port was opened
/// surface as `TransportError`.
pub trait SerialPort: Send {
    /// Write all bytes to the port
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read every byte that is currently buffered, without waiting
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Discard every byte that is currently buffered
    fn clear_input(&mut self) -> Result<()>;

    /// Get the port name
    fn name(&self) -> String;

    /// Close the port; later calls fail with `TransportError::Closed`
    fn close(&mut self) -> Result<()>;
}

/// Opens serial ports from a connection descriptor
pub trait PortOpener: Send + Sync {
    /// Open the port described by `params`
    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn SerialPort>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_params_defaults() {
        let params = ConnectionParams::new("/dev/ttyACM0");
        assert_eq!(params.baud_rate, 115_200);
        assert_eq!(params.read_timeout, Duration::from_millis(10));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_connection_params_validation() {
        assert!(ConnectionParams::new("  ").validate().is_err());
        assert!(ConnectionParams::new("COM3")
            .with_baud_rate(0)
            .validate()
            .is_err());
    }
}
