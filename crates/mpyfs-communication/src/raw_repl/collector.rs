//! Response collector
//!
//! Polls the port until either a complete marker frame has arrived or the
//! deadline passes. Whatever was read is returned in both cases; an I/O
//! failure during polling is an error of its own and never looks like
//! "no output yet".

use super::marker::MarkerCodec;
use crate::communication::SerialPort;
use mpyfs_core::Result;
use std::thread;
use std::time::{Duration, Instant};

/// Bytes gathered by one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    /// Accumulated bytes, possibly partial or empty
    pub bytes: Vec<u8>,
    /// Whether collection stopped on a complete frame
    pub marker_found: bool,
}

/// Timeout-bounded read loop
#[derive(Debug, Clone)]
pub struct ResponseCollector {
    codec: MarkerCodec,
    chunk_size: usize,
    poll_interval: Duration,
}

impl ResponseCollector {
    /// Create a collector
    pub fn new(codec: MarkerCodec, chunk_size: usize, poll_interval: Duration) -> Self {
        Self {
            codec,
            chunk_size: chunk_size.max(1),
            poll_interval,
        }
    }

    /// Read until a frame is complete or `deadline` passes
    ///
    /// Sleeps are clipped to the deadline, so the call returns no later than
    /// `deadline` plus one poll interval plus one read timeout of the port.
    pub fn collect(&self, port: &mut dyn SerialPort, deadline: Instant) -> Result<Collected> {
        let mut acc = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];
        let mut scanner = self.codec.scanner();

        loop {
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(
                    "Marker deadline passed on {} with {} bytes collected (start tag seen: {})",
                    port.name(),
                    acc.len(),
                    scanner.saw_start()
                );
                return Ok(Collected {
                    bytes: acc,
                    marker_found: false,
                });
            }

            let n = port.read(&mut chunk)?;
            if n > 0 {
                tracing::trace!("Read {} bytes", n);
                acc.extend_from_slice(&chunk[..n]);
                if scanner.update(&acc) {
                    return Ok(Collected {
                        bytes: acc,
                        marker_found: true,
                    });
                }
            } else {
                let remaining = deadline.saturating_duration_since(Instant::now());
                thread::sleep(self.poll_interval.min(remaining));
            }
        }
    }
}
