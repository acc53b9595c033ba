//! Protocol timing
//!
//! The raw REPL has no acknowledgement channel: every mode transition is
//! open-loop and relies on fixed settle delays. The values below were tuned
//! against real boards and are kept as overridable defaults.

use std::time::Duration;

/// Every delay, deadline and buffer size the raw REPL client uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTiming {
    /// Pause after the interrupt byte of the enter sequence
    pub interrupt_settle: Duration,
    /// Pause after the raw-enter byte
    pub enter_settle: Duration,
    /// Pause after the raw-exit byte
    pub exit_settle: Duration,
    /// Pauses after the double interrupt and the two soft resets of the warmup
    pub warmup_settle: [Duration; 3],
    /// How long to wait for a complete marker frame after submission
    pub marker_deadline: Duration,
    /// Sleep between empty reads while collecting
    pub poll_interval: Duration,
    /// Wait before the single read of a fixed-delay submission
    pub fixed_delay: Duration,
    /// Pause after a soft reset issued at the friendly prompt
    pub reset_settle: Duration,
    /// Maximum bytes requested per read
    pub read_chunk_size: usize,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            interrupt_settle: Duration::from_millis(80),
            enter_settle: Duration::from_millis(80),
            exit_settle: Duration::from_millis(50),
            warmup_settle: [
                Duration::from_millis(120),
                Duration::from_millis(150),
                Duration::from_millis(180),
            ],
            marker_deadline: Duration::from_secs(8),
            poll_interval: Duration::from_millis(20),
            fixed_delay: Duration::from_millis(200),
            reset_settle: Duration::from_millis(100),
            read_chunk_size: 1024,
        }
    }
}

impl ProtocolTiming {
    /// Timing with all settle delays collapsed, for simulated devices
    pub fn fast() -> Self {
        Self {
            interrupt_settle: Duration::from_millis(1),
            enter_settle: Duration::from_millis(1),
            exit_settle: Duration::from_millis(1),
            warmup_settle: [Duration::from_millis(1); 3],
            marker_deadline: Duration::from_millis(500),
            poll_interval: Duration::from_millis(2),
            fixed_delay: Duration::from_millis(20),
            reset_settle: Duration::from_millis(1),
            read_chunk_size: 1024,
        }
    }

    /// Override the marker deadline
    pub fn with_marker_deadline(mut self, deadline: Duration) -> Self {
        self.marker_deadline = deadline;
        self
    }
}
