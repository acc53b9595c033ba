//! Serial port communication implementation
//!
//! Provides low-level serial port operations for a direct USB or UART
//! connection to a MicroPython board.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Opening a port with an exclusive lock
//! - Time-bounded reads and input flushing
//! - Classification of open failures

use super::{ConnectionParams, PortOpener, SerialPort};
use mpyfs_core::{ConnectionError, Error, Result, TransportError};
use serde::Serialize;
use std::io::{self, Read, Write};

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List available serial ports on the system
///
/// With `all == false` only ports matching board adapter patterns are kept:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial*, /dev/cu.usbmodem*, /dev/cu.SLAB_USBtoUART*, /dev/cu.wchusbserial*
pub fn list_ports(all: bool) -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => {
            let port_infos: Vec<SerialPortInfo> = ports
                .iter()
                .filter(|port| all || is_board_port(&port.port_name))
                .map(|port| {
                    let info = SerialPortInfo::new(&port.port_name, get_port_description(port));

                    match &port.port_type {
                        serialport::SerialPortType::UsbPort(usb_info) => {
                            let mut info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                            if let Some(ref mfg) = usb_info.manufacturer {
                                info = info.with_manufacturer(mfg);
                            }
                            if let Some(ref serial) = usb_info.serial_number {
                                info = info.with_serial_number(serial);
                            }
                            info
                        }
                        _ => info,
                    }
                })
                .collect();

            Ok(port_infos)
        }
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(Error::other(format!("Failed to enumerate ports: {}", e)))
        }
    }
}

fn is_board_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    [
        "/dev/cu.usbserial",
        "/dev/cu.usbmodem",
        "/dev/cu.SLAB_USBtoUART",
        "/dev/cu.wchusbserial",
    ]
    .iter()
    .any(|prefix| port_name.starts_with(prefix))
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Map an open failure to the connection error taxonomy
pub fn classify_open_error(port: &str, err: &serialport::Error) -> ConnectionError {
    let low = err.description.to_lowercase();

    match err.kind() {
        // EBUSY under TIOCEXCL and a failed exclusive flock both arrive as NoDevice
        serialport::ErrorKind::NoDevice => ConnectionError::PortInUse {
            port: port.to_string(),
        },
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => ConnectionError::PortNotFound {
            port: port.to_string(),
        },
        _ if low.contains("busy") || low.contains("already open") => ConnectionError::PortInUse {
            port: port.to_string(),
        },
        // Windows reports a port held by another process as access denied
        _ if low.contains("access is denied") => ConnectionError::PortInUse {
            port: port.to_string(),
        },
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            ConnectionError::PermissionDenied {
                port: port.to_string(),
            }
        }
        _ if low.contains("permission denied") => ConnectionError::PermissionDenied {
            port: port.to_string(),
        },
        _ if low.contains("no such file") => ConnectionError::PortNotFound {
            port: port.to_string(),
        },
        _ => ConnectionError::FailedToOpen {
            port: port.to_string(),
            reason: err.description.clone(),
        },
    }
}

fn is_quiet_read(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Real serial port implementation using serialport crate
pub struct RealSerialPort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
}

impl RealSerialPort {
    /// Open a serial port with the given parameters
    ///
    /// On Unix the port is opened exclusively, so a second open of the same
    /// device fails with `PortInUse` instead of sharing the line.
    pub fn open(params: &ConnectionParams) -> Result<Self> {
        params.validate()?;

        let builder = serialport::new(&params.port, params.baud_rate)
            .timeout(params.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => {
                tracing::debug!("Opened {} at {} baud", params.port, params.baud_rate);
                Ok(RealSerialPort {
                    port: Some(port),
                    name: params.port.clone(),
                })
            }
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                Err(classify_open_error(&params.port, &e).into())
            }
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        let name = &self.name;
        self.port.as_mut().ok_or_else(|| {
            TransportError::Closed {
                port: name.clone(),
            }
            .into()
        })
    }
}

impl SerialPort for RealSerialPort {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(|e| {
                TransportError::WriteFailed {
                    reason: e.to_string(),
                }
                .into()
            })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_quiet_read(&e) => Ok(0),
            Err(e) => Err(TransportError::ReadFailed {
                reason: e.to_string(),
            }
            .into()),
        }
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port_mut()?;
        let pending = port.bytes_to_read().map_err(|e| TransportError::ReadFailed {
            reason: e.to_string(),
        })? as usize;

        let mut out = vec![0u8; pending];
        let mut filled = 0;
        while filled < pending {
            match port.read(&mut out[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if is_quiet_read(&e) => break,
                Err(e) => {
                    return Err(TransportError::ReadFailed {
                        reason: e.to_string(),
                    }
                    .into())
                }
            }
        }
        out.truncate(filled);
        Ok(out)
    }

    fn clear_input(&mut self) -> Result<()> {
        let port = self.port_mut()?;
        port.clear(serialport::ClearBuffer::Input).map_err(|e| {
            TransportError::ReadFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            tracing::debug!("Closed {}", self.name);
        }
        Ok(())
    }
}

/// Opens real hardware ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn SerialPort>> {
        Ok(Box::new(RealSerialPort::open(params)?))
    }
}
