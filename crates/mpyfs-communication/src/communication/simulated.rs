//! Simulated MicroPython board
//!
//! Models the device side of the serial link closely enough to exercise the
//! raw REPL client without hardware: friendly/raw modes, banner echo on
//! control bytes, program capture up to the end-of-submission byte,
//! scripted replies with latency, injected read failures and a single
//! holder per port.

use super::{ConnectionParams, PortOpener, SerialPort};
use mpyfs_core::constants::{
    CTRL_ENTER_RAW, CTRL_EOT, CTRL_EXIT_RAW, CTRL_INTERRUPT, MARKER_END, MARKER_START,
};
use mpyfs_core::{ConnectionError, Result, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRIENDLY_BANNER: &str = "\r\nMicroPython v1.22.0 on 2024-01-01; Simulated board with ESP32\r\nType \"help()\" for more information.\r\n>>> ";
const RAW_BANNER: &str = "raw REPL; CTRL-B to exit\r\n>";
const SOFT_REBOOT: &str = "MPY: soft reboot";

/// What the simulated board prints in answer to one submitted program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceReply {
    /// Bytes printed by the program
    pub output: Vec<u8>,
    /// Time before the output becomes readable
    pub delay: Duration,
}

impl DeviceReply {
    /// Output available right away
    pub fn immediate(output: impl Into<Vec<u8>>) -> Self {
        Self {
            output: output.into(),
            delay: Duration::ZERO,
        }
    }

    /// A marker-framed payload, as printed by the filesystem snippets
    pub fn marker(payload: &str) -> Self {
        Self::immediate(format!("{}{}{}", MARKER_START, payload, MARKER_END))
    }

    /// A program that prints nothing
    pub fn silent() -> Self {
        Self::default()
    }

    /// Make the reply readable only after `delay`
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// REPL mode of the simulated board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedMode {
    /// Friendly `>>>` prompt
    Friendly,
    /// Raw REPL
    Raw,
}

type Responder = Box<dyn FnMut(&str) -> DeviceReply + Send>;

struct Pending {
    ready_at: Instant,
    bytes: Vec<u8>,
}

struct DeviceState {
    mode: SimulatedMode,
    program: Vec<u8>,
    outbound: VecDeque<Pending>,
    programs: Vec<String>,
    written: Vec<u8>,
    soft_resets: usize,
    interrupts: usize,
    held: bool,
    read_failure: Option<String>,
    responder: Responder,
}

impl DeviceState {
    fn emit(&mut self, bytes: impl Into<Vec<u8>>, delay: Duration) {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return;
        }
        // Output stays ordered even when an earlier chunk is delayed
        let ready_at = self
            .outbound
            .back()
            .map(|p| p.ready_at)
            .unwrap_or_else(Instant::now)
            .max(Instant::now() + delay);
        self.outbound.push_back(Pending { ready_at, bytes });
    }

    fn receive(&mut self, data: &[u8]) {
        self.written.extend_from_slice(data);

        for &byte in data {
            match byte {
                CTRL_INTERRUPT => {
                    self.interrupts += 1;
                    self.program.clear();
                    if self.mode == SimulatedMode::Friendly {
                        self.emit("\r\n>>> ", Duration::ZERO);
                    }
                }
                CTRL_ENTER_RAW => {
                    self.mode = SimulatedMode::Raw;
                    self.program.clear();
                    self.emit(RAW_BANNER, Duration::ZERO);
                }
                CTRL_EXIT_RAW => {
                    self.mode = SimulatedMode::Friendly;
                    self.program.clear();
                    self.emit(FRIENDLY_BANNER, Duration::ZERO);
                }
                CTRL_EOT => match self.mode {
                    SimulatedMode::Raw => self.run_program(),
                    SimulatedMode::Friendly => {
                        self.soft_resets += 1;
                        self.emit(format!("{}{}", SOFT_REBOOT, FRIENDLY_BANNER), Duration::ZERO);
                    }
                },
                other => match self.mode {
                    SimulatedMode::Raw => self.program.push(other),
                    SimulatedMode::Friendly => self.emit(vec![other], Duration::ZERO),
                },
            }
        }
    }

    fn run_program(&mut self) {
        let program = String::from_utf8_lossy(&std::mem::take(&mut self.program)).into_owned();
        let reply = (self.responder)(&program);
        self.programs.push(program);

        self.emit("OK", Duration::ZERO);
        let mut tail = reply.output;
        tail.extend_from_slice(b"\x04\x04>");
        self.emit(tail, reply.delay);
    }

    fn ready_len(&self) -> usize {
        let now = Instant::now();
        self.outbound
            .iter()
            .take_while(|p| p.ready_at <= now)
            .map(|p| p.bytes.len())
            .sum()
    }

    fn take_ready(&mut self, max: usize) -> Vec<u8> {
        let now = Instant::now();
        let mut out = Vec::new();

        while out.len() < max {
            let Some(front) = self.outbound.front_mut() else {
                break;
            };
            if front.ready_at > now {
                break;
            }

            let want = max - out.len();
            if front.bytes.len() <= want {
                out.extend_from_slice(&front.bytes);
                self.outbound.pop_front();
            } else {
                out.extend(front.bytes.drain(..want));
            }
        }

        out
    }
}

/// Handle to a simulated board; clones share the same device
#[derive(Clone)]
pub struct SimulatedDevice {
    name: String,
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedDevice {
    /// Create a board whose programs are answered by `responder`
    pub fn new(
        name: impl Into<String>,
        responder: impl FnMut(&str) -> DeviceReply + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(DeviceState {
                mode: SimulatedMode::Friendly,
                program: Vec::new(),
                outbound: VecDeque::new(),
                programs: Vec::new(),
                written: Vec::new(),
                soft_resets: 0,
                interrupts: 0,
                held: false,
                read_failure: None,
                responder: Box::new(responder),
            })),
        }
    }

    /// Create a board that answers every program with the same reply
    pub fn with_reply(name: impl Into<String>, reply: DeviceReply) -> Self {
        Self::new(name, move |_| reply.clone())
    }

    /// Port name this board answers to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Programs received so far, without their end-of-submission byte
    pub fn programs(&self) -> Vec<String> {
        self.state.lock().programs.clone()
    }

    /// Every byte the host wrote
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Bytes the host could read right now
    pub fn pending_input(&self) -> usize {
        self.state.lock().ready_len()
    }

    /// Current REPL mode
    pub fn mode(&self) -> SimulatedMode {
        self.state.lock().mode
    }

    /// Soft resets received at the friendly prompt
    pub fn soft_resets(&self) -> usize {
        self.state.lock().soft_resets
    }

    /// Interrupts received
    pub fn interrupts(&self) -> usize {
        self.state.lock().interrupts
    }

    /// Whether a port handle is currently open
    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    /// Make the next read fail with an I/O error
    pub fn fail_next_read(&self, reason: impl Into<String>) {
        self.state.lock().read_failure = Some(reason.into());
    }

    /// Print unsolicited bytes, as a running program or boot log would
    pub fn push_output(&self, bytes: impl Into<Vec<u8>>) {
        self.state.lock().emit(bytes, Duration::ZERO);
    }
}

impl PortOpener for SimulatedDevice {
    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn SerialPort>> {
        params.validate()?;

        if params.port != self.name {
            return Err(ConnectionError::PortNotFound {
                port: params.port.clone(),
            }
            .into());
        }

        let mut state = self.state.lock();
        if state.held {
            return Err(ConnectionError::PortInUse {
                port: params.port.clone(),
            }
            .into());
        }
        state.held = true;

        Ok(Box::new(SimulatedPort {
            device: self.clone(),
            open: true,
        }))
    }
}

/// Open handle to a [`SimulatedDevice`]
pub struct SimulatedPort {
    device: SimulatedDevice,
    open: bool,
}

impl SimulatedPort {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::Closed {
                port: self.device.name.clone(),
            }
            .into())
        }
    }
}

impl SerialPort for SimulatedPort {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.device.state.lock().receive(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut state = self.device.state.lock();

        if let Some(reason) = state.read_failure.take() {
            return Err(TransportError::ReadFailed { reason }.into());
        }

        let bytes = state.take_ready(buf.len());
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let mut state = self.device.state.lock();

        if let Some(reason) = state.read_failure.take() {
            return Err(TransportError::ReadFailed { reason }.into());
        }

        Ok(state.take_ready(usize::MAX))
    }

    fn clear_input(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.device.state.lock();
        let ready = state.ready_len();
        state.take_ready(ready);
        Ok(())
    }

    fn name(&self) -> String {
        self.device.name.clone()
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.device.state.lock().held = false;
        }
        Ok(())
    }
}

impl Drop for SimulatedPort {
    fn drop(&mut self) {
        if self.open {
            self.device.state.lock().held = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_capture_and_reply() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::marker("ok"));
        let mut port = device.open(&ConnectionParams::new("sim")).unwrap();

        port.write(&[CTRL_ENTER_RAW]).unwrap();
        port.clear_input().unwrap();
        port.write(b"print(1)\x04").unwrap();

        let out = port.read_available().unwrap();
        assert_eq!(out, b"OK<thonny>ok</thonny>\x04\x04>".to_vec());
        assert_eq!(device.programs(), vec!["print(1)".to_string()]);
    }

    #[test]
    fn test_delayed_reply_is_not_ready() {
        let device = SimulatedDevice::with_reply(
            "sim",
            DeviceReply::marker("late").after(Duration::from_secs(60)),
        );
        let mut port = device.open(&ConnectionParams::new("sim")).unwrap();

        port.write(&[CTRL_ENTER_RAW]).unwrap();
        port.clear_input().unwrap();
        port.write(b"x\x04").unwrap();

        assert_eq!(port.read_available().unwrap(), b"OK".to_vec());
        assert_eq!(device.pending_input(), 0);
    }

    #[test]
    fn test_soft_reset_at_friendly_prompt() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
        let mut port = device.open(&ConnectionParams::new("sim")).unwrap();

        port.write(&[CTRL_EOT]).unwrap();
        assert_eq!(device.soft_resets(), 1);
        assert_eq!(device.mode(), SimulatedMode::Friendly);
    }

    #[test]
    fn test_single_holder() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
        let params = ConnectionParams::new("sim");

        let mut first = device.open(&params).unwrap();
        assert!(device.open(&params).is_err());

        first.close().unwrap();
        assert!(!device.is_held());
        assert!(device.open(&params).is_ok());
    }

    #[test]
    fn test_closed_port_rejects_io() {
        let device = SimulatedDevice::with_reply("sim", DeviceReply::silent());
        let mut port = device.open(&ConnectionParams::new("sim")).unwrap();
        port.close().unwrap();

        let err = port.write(b"x").unwrap_err();
        assert!(err.is_transient());
    }
}
