//! Wire constants of the MicroPython raw REPL

/// Ctrl-A: enter raw REPL
pub const CTRL_ENTER_RAW: u8 = 0x01;

/// Ctrl-B: leave raw REPL, back to the friendly prompt
pub const CTRL_EXIT_RAW: u8 = 0x02;

/// Ctrl-C: interrupt whatever is running
pub const CTRL_INTERRUPT: u8 = 0x03;

/// Ctrl-D: end of submission in raw mode, soft reset at the friendly prompt
pub const CTRL_EOT: u8 = 0x04;

/// Start delimiter printed by every machine-parsed snippet
pub const MARKER_START: &str = "<thonny>";

/// End delimiter printed by every machine-parsed snippet
pub const MARKER_END: &str = "</thonny>";

/// Default baud rate (ignored by most USB CDC boards)
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default per-read timeout of the serial port, in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10;
