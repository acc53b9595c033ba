//! Raw REPL protocol client
//!
//! A submission goes through these steps:
//! 1. [`RawModeController`] interrupts the board and switches it to raw mode
//! 2. [`ExecutionDriver`] frames the snippet and writes it
//! 3. [`ResponseCollector`] reads until a marker frame or the deadline
//! 4. [`MarkerCodec`] decodes the payload between the markers
//! 5. [`RawModeController`] restores the friendly prompt
//!
//! [`RawReplSession`] scopes one opened port through those steps and
//! [`DeviceClient`] runs a whole operation per call.

pub mod collector;
pub mod controller;
pub mod driver;
pub mod marker;
pub mod session;

pub use collector::{Collected, ResponseCollector};
pub use controller::{RawModeController, RawReplState};
pub use driver::ExecutionDriver;
pub use marker::{FrameScanner, MarkerCodec};
pub use session::{DeviceClient, RawReplSession};

use mpyfs_core::constants::CTRL_EOT;
use mpyfs_core::DirEntry;
use std::time::Duration;

/// How the end of a submission's output is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Read until a complete marker frame arrives or the deadline passes
    ExpectMarker,
    /// Wait a fixed interval, then take whatever is buffered
    FixedDelay,
}

/// Shape expected between the markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    /// JSON list of `{"name", "isDir"}` records
    Entries,
    /// Opaque status token
    Status,
    /// Base64 text of a binary blob
    Binary,
    /// Any JSON document
    Json,
    /// No markers; the raw output is the result
    Verbatim,
}

/// A program body for the device plus how to treat its output
///
/// The body is opaque here; it is transmitted as-is followed by the
/// end-of-submission byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// MicroPython source
    pub body: String,
    /// How completion is detected
    pub completion: CompletionMode,
    /// Shape of the payload
    pub decoding: Decoding,
    /// Run the recovery handshake before entering raw mode
    pub warmup: bool,
}

impl Snippet {
    /// A marker-synchronized snippet
    pub fn expect(body: impl Into<String>, decoding: Decoding) -> Self {
        Self {
            body: body.into(),
            completion: CompletionMode::ExpectMarker,
            decoding,
            warmup: false,
        }
    }

    /// An arbitrary user program whose output is returned verbatim
    pub fn program(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            completion: CompletionMode::FixedDelay,
            decoding: Decoding::Verbatim,
            warmup: true,
        }
    }

    /// Body followed by the end-of-submission byte
    pub fn framed(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.body.len() + 1);
        data.extend_from_slice(self.body.as_bytes());
        data.push(CTRL_EOT);
        data
    }
}

/// Bytes collected for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Everything read back, including device noise
    pub bytes: Vec<u8>,
    /// Whether a complete marker frame was seen
    pub marker_found: bool,
    /// Time from submission to the end of collection
    pub elapsed: Duration,
}

/// Decoded result of one submission
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Directory listing, in device order
    Entries(Vec<DirEntry>),
    /// Status token
    Status(String),
    /// Binary payload
    Binary(Vec<u8>),
    /// JSON document
    Json(serde_json::Value),
    /// Verbatim program output
    Output(Vec<u8>),
    /// No marker frame in the response
    NoPayload,
}

impl Decoded {
    /// True when the response carried no marker frame
    pub fn is_no_payload(&self) -> bool {
        matches!(self, Decoded::NoPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_framing_appends_single_eot() {
        let snippet = Snippet::expect("print('x')", Decoding::Status);
        let framed = snippet.framed();
        assert_eq!(framed.last(), Some(&CTRL_EOT));
        assert_eq!(&framed[..framed.len() - 1], b"print('x')");
        assert_eq!(framed.iter().filter(|&&b| b == CTRL_EOT).count(), 1);
    }

    #[test]
    fn test_program_snippet_defaults() {
        let snippet = Snippet::program("while True: pass");
        assert_eq!(snippet.completion, CompletionMode::FixedDelay);
        assert_eq!(snippet.decoding, Decoding::Verbatim);
        assert!(snippet.warmup);
    }
}
