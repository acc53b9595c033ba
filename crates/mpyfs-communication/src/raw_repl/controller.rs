//! Raw-mode controller
//!
//! Switches the board between its friendly prompt and the raw REPL. The
//! board never acknowledges a transition; each step is followed by a fixed
//! settle delay and buffered echo is discarded afterwards.

use crate::communication::SerialPort;
use mpyfs_core::constants::{CTRL_ENTER_RAW, CTRL_EOT, CTRL_EXIT_RAW, CTRL_INTERRUPT};
use mpyfs_core::{ProtocolError, ProtocolTiming, Result};
use std::fmt;
use std::thread;

/// Handshake state of the board as far as the host knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawReplState {
    /// Friendly prompt
    Interactive,
    /// Enter sequence in progress
    Entering,
    /// Raw REPL, ready for a submission
    Raw,
    /// Exit sequence in progress
    Exiting,
}

impl fmt::Display for RawReplState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::Entering => write!(f, "entering"),
            Self::Raw => write!(f, "raw"),
            Self::Exiting => write!(f, "exiting"),
        }
    }
}

/// Drives the enter/exit/warmup control sequences
#[derive(Debug, Clone)]
pub struct RawModeController {
    state: RawReplState,
    timing: ProtocolTiming,
}

impl RawModeController {
    /// Create a controller for a board sitting at its friendly prompt
    pub fn new(timing: ProtocolTiming) -> Self {
        Self {
            state: RawReplState::Interactive,
            timing,
        }
    }

    /// Current state
    pub fn state(&self) -> RawReplState {
        self.state
    }

    /// Whether the board may be outside its friendly prompt
    pub fn needs_exit(&self) -> bool {
        self.state != RawReplState::Interactive
    }

    fn require(&self, expected: RawReplState, requested: RawReplState) -> Result<()> {
        if self.state != expected {
            return Err(ProtocolError::InvalidStateTransition {
                current: self.state.to_string(),
                requested: requested.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Recover a board stuck mid-output from an earlier session
    ///
    /// Two interrupts, then two soft resets, each followed by a longer
    /// settle delay and an input flush.
    pub fn warmup(&mut self, port: &mut dyn SerialPort) -> Result<()> {
        self.require(RawReplState::Interactive, RawReplState::Interactive)?;
        tracing::debug!("Warmup handshake on {}", port.name());

        let steps: [&[u8]; 3] = [&[CTRL_INTERRUPT, CTRL_INTERRUPT], &[CTRL_EOT], &[CTRL_EOT]];
        for (bytes, settle) in steps.iter().zip(self.timing.warmup_settle) {
            port.write(bytes)?;
            thread::sleep(settle);
            port.clear_input()?;
        }

        Ok(())
    }

    /// Interrupt, request raw mode, then drop the banner
    pub fn enter(&mut self, port: &mut dyn SerialPort) -> Result<()> {
        self.require(RawReplState::Interactive, RawReplState::Raw)?;
        self.state = RawReplState::Entering;
        tracing::debug!("Entering raw REPL on {}", port.name());

        port.write(&[CTRL_INTERRUPT])?;
        thread::sleep(self.timing.interrupt_settle);
        port.write(&[CTRL_ENTER_RAW])?;
        thread::sleep(self.timing.enter_settle);
        port.clear_input()?;

        self.state = RawReplState::Raw;
        Ok(())
    }

    /// Return to the friendly prompt and drop its banner
    pub fn exit(&mut self, port: &mut dyn SerialPort) -> Result<()> {
        self.require(RawReplState::Raw, RawReplState::Interactive)?;
        self.state = RawReplState::Exiting;
        tracing::debug!("Leaving raw REPL on {}", port.name());

        port.write(&[CTRL_EXIT_RAW])?;
        thread::sleep(self.timing.exit_settle);
        port.clear_input()?;

        self.state = RawReplState::Interactive;
        Ok(())
    }

    /// Send the exit byte whatever the state, for cleanup after a failure
    pub fn abort(&mut self, port: &mut dyn SerialPort) -> Result<()> {
        if !self.needs_exit() {
            return Ok(());
        }

        let result = port.write(&[CTRL_EXIT_RAW]);
        thread::sleep(self.timing.exit_settle);
        self.state = RawReplState::Interactive;
        result
    }
}
