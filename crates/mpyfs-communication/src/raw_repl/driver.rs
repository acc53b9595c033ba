//! Execution driver
//!
//! Writes a framed snippet to a board already in raw mode and gathers its
//! output according to the snippet's completion mode. A missing marker is
//! not an error here; decoding decides what it means.

use super::collector::ResponseCollector;
use super::marker::MarkerCodec;
use super::{CompletionMode, RawResponse, Snippet};
use crate::communication::SerialPort;
use mpyfs_core::{ProtocolTiming, Result};
use std::thread;
use std::time::Instant;

/// Submits snippets and collects their raw output
#[derive(Debug, Clone)]
pub struct ExecutionDriver {
    collector: ResponseCollector,
    timing: ProtocolTiming,
}

impl ExecutionDriver {
    /// Create a driver
    pub fn new(codec: MarkerCodec, timing: ProtocolTiming) -> Self {
        Self {
            collector: ResponseCollector::new(codec, timing.read_chunk_size, timing.poll_interval),
            timing,
        }
    }

    /// Submit one snippet and return everything read back
    pub fn submit(&self, port: &mut dyn SerialPort, snippet: &Snippet) -> Result<RawResponse> {
        let framed = snippet.framed();
        tracing::debug!(
            "Submitting {} bytes ({:?}) to {}",
            framed.len(),
            snippet.completion,
            port.name()
        );

        let submitted = Instant::now();
        port.write(&framed)?;

        match snippet.completion {
            CompletionMode::ExpectMarker => {
                let deadline = Instant::now() + self.timing.marker_deadline;
                let collected = self.collector.collect(port, deadline)?;
                if !collected.marker_found {
                    tracing::warn!(
                        "No result marker from {} within {}ms",
                        port.name(),
                        self.timing.marker_deadline.as_millis()
                    );
                }
                Ok(RawResponse {
                    bytes: collected.bytes,
                    marker_found: collected.marker_found,
                    elapsed: submitted.elapsed(),
                })
            }
            CompletionMode::FixedDelay => {
                thread::sleep(self.timing.fixed_delay);
                let bytes = port.read_available()?;
                Ok(RawResponse {
                    bytes,
                    marker_found: false,
                    elapsed: submitted.elapsed(),
                })
            }
        }
    }
}
