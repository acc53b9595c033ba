//! # mpyfs Communication
//!
//! Talks to a MicroPython board over a serial link without any helper
//! installed on the device. Programs are pushed through the raw REPL and
//! results are scraped from marker-delimited output.
//!
//! Layers, leaves first:
//! - [`communication`]: serial transport, port discovery, simulated device
//! - [`raw_repl`]: raw-mode handshake, submission, response collection,
//!   marker decoding, scoped sessions
//! - [`micropython`]: snippet bodies and typed filesystem operations

pub mod communication;
pub mod micropython;
pub mod raw_repl;

pub use communication::{
    serial::{list_ports, RealSerialPort, SerialPortInfo, SystemPortOpener},
    simulated::{DeviceReply, SimulatedDevice},
    ConnectionParams, PortOpener, SerialPort,
};

pub use raw_repl::{
    CompletionMode, Decoded, Decoding, DeviceClient, MarkerCodec, RawModeController,
    RawReplSession, RawReplState, RawResponse, Snippet,
};

pub use micropython::{BoardFs, SnippetBuilder};
