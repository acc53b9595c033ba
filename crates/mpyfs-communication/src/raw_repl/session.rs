//! Scoped raw REPL sessions
//!
//! A [`RawReplSession`] owns one opened port for the length of one
//! operation. Dropping it, on success or on any error path, leaves raw mode
//! if needed and closes the port. [`DeviceClient`] wraps a full operation
//! (open, handshake, submit, decode, exit, close) into a single call.

use super::controller::{RawModeController, RawReplState};
use super::driver::ExecutionDriver;
use super::marker::MarkerCodec;
use super::{Decoded, RawResponse, Snippet};
use crate::communication::serial::SystemPortOpener;
use crate::communication::{ConnectionParams, PortOpener, SerialPort};
use mpyfs_core::constants::CTRL_EOT;
use mpyfs_core::{ProtocolError, ProtocolTiming, Result};
use std::sync::Arc;
use std::thread;

/// One opened port plus its raw-mode state
pub struct RawReplSession {
    port: Box<dyn SerialPort>,
    controller: RawModeController,
    driver: ExecutionDriver,
    codec: MarkerCodec,
    timing: ProtocolTiming,
}

impl RawReplSession {
    /// Open the port; the board is assumed to sit at its friendly prompt
    pub fn open(
        opener: &dyn PortOpener,
        params: &ConnectionParams,
        timing: ProtocolTiming,
        codec: MarkerCodec,
    ) -> Result<Self> {
        let port = opener.open(params)?;
        Ok(Self {
            port,
            controller: RawModeController::new(timing),
            driver: ExecutionDriver::new(codec.clone(), timing),
            codec,
            timing,
        })
    }

    /// Current handshake state
    pub fn state(&self) -> RawReplState {
        self.controller.state()
    }

    /// Marker codec used to decode responses
    pub fn codec(&self) -> &MarkerCodec {
        &self.codec
    }

    /// Recovery handshake for a board left busy by an earlier session
    pub fn warmup(&mut self) -> Result<()> {
        self.controller.warmup(self.port.as_mut())
    }

    /// Switch the board to raw mode
    pub fn enter_raw(&mut self) -> Result<()> {
        self.controller.enter(self.port.as_mut())
    }

    /// Back to the friendly prompt
    pub fn exit_raw(&mut self) -> Result<()> {
        self.controller.exit(self.port.as_mut())
    }

    /// Submit a snippet and return the raw output
    pub fn execute(&mut self, snippet: &Snippet) -> Result<RawResponse> {
        if self.controller.state() != RawReplState::Raw {
            return Err(ProtocolError::InvalidStateTransition {
                current: self.controller.state().to_string(),
                requested: "submit".to_string(),
            }
            .into());
        }
        self.driver.submit(self.port.as_mut(), snippet)
    }

    /// Submit a snippet and decode its output
    pub fn run(&mut self, snippet: &Snippet) -> Result<Decoded> {
        let response = self.execute(snippet)?;
        self.codec.decode(&response.bytes, snippet.decoding)
    }

    /// Soft-reset the board from its friendly prompt
    pub fn soft_reset(&mut self) -> Result<()> {
        if self.controller.state() != RawReplState::Interactive {
            return Err(ProtocolError::InvalidStateTransition {
                current: self.controller.state().to_string(),
                requested: "soft reset".to_string(),
            }
            .into());
        }
        tracing::debug!("Soft reset on {}", self.port.name());
        self.port.write(&[CTRL_EOT])?;
        thread::sleep(self.timing.reset_settle);
        Ok(())
    }

    /// Leave raw mode if needed and release the port
    pub fn close(mut self) -> Result<()> {
        let exited = if self.controller.state() == RawReplState::Raw {
            self.controller.exit(self.port.as_mut())
        } else {
            self.controller.abort(self.port.as_mut())
        };
        let closed = self.port.close();
        exited.and(closed)
    }
}

impl Drop for RawReplSession {
    fn drop(&mut self) {
        if self.controller.needs_exit() {
            if let Err(e) = self.controller.abort(self.port.as_mut()) {
                tracing::warn!("Could not leave raw REPL on {}: {}", self.port.name(), e);
            }
        }
        if let Err(e) = self.port.close() {
            tracing::warn!("Could not close {}: {}", self.port.name(), e);
        }
    }
}

/// Runs one complete device operation per call
///
/// Holds no connection between calls; every call opens the port, performs
/// the handshake, submits, decodes and releases the port again.
#[derive(Clone)]
pub struct DeviceClient {
    opener: Arc<dyn PortOpener>,
    params: ConnectionParams,
    timing: ProtocolTiming,
    codec: MarkerCodec,
}

impl DeviceClient {
    /// Create a client using `opener` to reach the board
    pub fn new(opener: Arc<dyn PortOpener>, params: ConnectionParams, timing: ProtocolTiming) -> Self {
        Self {
            opener,
            params,
            timing,
            codec: MarkerCodec::default(),
        }
    }

    /// Create a client for a real serial port
    pub fn system(params: ConnectionParams, timing: ProtocolTiming) -> Self {
        Self::new(Arc::new(SystemPortOpener), params, timing)
    }

    /// Use a custom tag pair
    pub fn with_codec(mut self, codec: MarkerCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Connection descriptor
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Protocol timing
    pub fn timing(&self) -> &ProtocolTiming {
        &self.timing
    }

    /// Marker codec
    pub fn codec(&self) -> &MarkerCodec {
        &self.codec
    }

    /// Open a session for multi-step work on one connection
    pub fn session(&self) -> Result<RawReplSession> {
        RawReplSession::open(
            self.opener.as_ref(),
            &self.params,
            self.timing,
            self.codec.clone(),
        )
    }

    /// Run one snippet as a complete operation
    pub fn run(&self, snippet: &Snippet) -> Result<Decoded> {
        let mut session = self.session()?;

        if snippet.warmup {
            if let Err(e) = session.warmup() {
                tracing::warn!("Warmup handshake failed, continuing: {}", e);
            }
        }

        session.enter_raw()?;
        let decoded = session.run(snippet);

        match (decoded, session.close()) {
            (Ok(decoded), Ok(())) => Ok(decoded),
            (Ok(decoded), Err(e)) => {
                tracing::warn!("Result received but session teardown failed: {}", e);
                Ok(decoded)
            }
            (Err(e), _) => Err(e),
        }
    }

    /// Soft-reset the board without entering raw mode
    pub fn soft_reset(&self) -> Result<()> {
        let mut session = self.session()?;
        session.soft_reset()?;
        session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::simulated::{DeviceReply, SimulatedDevice, SimulatedMode};
    use crate::raw_repl::Decoding;

    fn client(device: &SimulatedDevice) -> DeviceClient {
        DeviceClient::new(
            Arc::new(device.clone()),
            ConnectionParams::new(device.name()),
            ProtocolTiming::fast(),
        )
    }

    #[test]
    fn test_run_releases_port() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::marker("ok"));
        let decoded = client(&device)
            .run(&Snippet::expect("print(1)", Decoding::Status))
            .unwrap();

        assert_eq!(decoded, Decoded::Status("ok".to_string()));
        assert!(!device.is_held());
        assert_eq!(device.mode(), SimulatedMode::Friendly);
    }

    #[test]
    fn test_drop_after_error_leaves_raw_mode() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::marker("[]"));
        let client = client(&device);

        {
            let mut session = client.session().unwrap();
            session.enter_raw().unwrap();
            device.fail_next_read("gone");
            let result = session.run(&Snippet::expect("x", Decoding::Entries));
            assert!(result.unwrap_err().is_transient());
        }

        assert!(!device.is_held());
        assert_eq!(device.mode(), SimulatedMode::Friendly);
    }

    #[test]
    fn test_execute_requires_raw_mode() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
        let mut session = client(&device).session().unwrap();

        let err = session
            .execute(&Snippet::expect("x", Decoding::Status))
            .unwrap_err();
        assert!(err.is_protocol_error());
        assert!(device.programs().is_empty());
    }

    #[test]
    fn test_soft_reset() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
        client(&device).soft_reset().unwrap();

        assert_eq!(device.soft_resets(), 1);
        assert_eq!(device.written(), vec![CTRL_EOT]);
        assert!(!device.is_held());
    }
}
