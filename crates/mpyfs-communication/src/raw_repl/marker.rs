//! Marker codec
//!
//! Every machine-parsed snippet prints its result as
//! `<thonny>payload</thonny>`. The frame can sit anywhere in the output:
//! the raw REPL prefixes `OK`, and banners or stray prints may surround it.
//! Payloads must never contain the end tag; binary data is carried as base64.

use super::{Decoded, Decoding};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mpyfs_core::constants::{MARKER_END, MARKER_START};
use mpyfs_core::{DirEntry, ProtocolError, Result};

/// Position of `needle` in `haystack`
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn corrupt(reason: impl Into<String>) -> ProtocolError {
    ProtocolError::CorruptPayload {
        reason: reason.into(),
    }
}

/// Locates and decodes marker frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCodec {
    start: String,
    end: String,
}

impl Default for MarkerCodec {
    fn default() -> Self {
        Self::new(MARKER_START, MARKER_END)
    }
}

impl MarkerCodec {
    /// Create a codec for a custom tag pair
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Start tag
    pub fn start_tag(&self) -> &str {
        &self.start
    }

    /// End tag
    pub fn end_tag(&self) -> &str {
        &self.end
    }

    /// Wrap a payload in the tag pair
    pub fn frame(&self, payload: &str) -> String {
        format!("{}{}{}", self.start, payload, self.end)
    }

    /// The payload between the first start tag and the first end tag after it
    pub fn extract<'a>(&self, raw: &'a [u8]) -> Option<&'a [u8]> {
        let start = find_bytes(raw, self.start.as_bytes())? + self.start.len();
        let len = find_bytes(&raw[start..], self.end.as_bytes())?;
        Some(&raw[start..start + len])
    }

    /// Whether `raw` holds a complete frame
    pub fn contains_frame(&self, raw: &[u8]) -> bool {
        self.extract(raw).is_some()
    }

    /// Start an incremental scan over a growing buffer
    pub fn scanner(&self) -> FrameScanner<'_> {
        FrameScanner {
            codec: self,
            payload_start: None,
            scanned: 0,
        }
    }

    /// Decode a raw response into the expected shape
    ///
    /// A missing frame yields `Decoded::NoPayload`; a frame whose interior
    /// does not decode yields `ProtocolError::CorruptPayload`. Binary frames
    /// starting with `!` carry a device error instead of base64, which never
    /// contains `!`.
    pub fn decode(&self, raw: &[u8], decoding: Decoding) -> Result<Decoded> {
        if decoding == Decoding::Verbatim {
            return Ok(Decoded::Output(raw.to_vec()));
        }

        let Some(payload) = self.extract(raw) else {
            return Ok(Decoded::NoPayload);
        };

        let decoded = match decoding {
            Decoding::Entries => Decoded::Entries(Self::decode_entries(payload)?),
            Decoding::Status => Decoded::Status(Self::payload_text(payload)?.to_string()),
            Decoding::Binary => match payload.strip_prefix(b"!") {
                Some(message) => {
                    return Err(ProtocolError::DeviceReported {
                        operation: "read".to_string(),
                        message: String::from_utf8_lossy(message).into_owned(),
                    }
                    .into())
                }
                None => Decoded::Binary(Self::decode_binary(payload)?),
            },
            Decoding::Json => {
                let text = Self::payload_text(payload)?;
                Decoded::Json(
                    serde_json::from_str(text).map_err(|e| corrupt(format!("invalid JSON: {}", e)))?,
                )
            }
            Decoding::Verbatim => Decoded::Output(raw.to_vec()),
        };

        Ok(decoded)
    }

    /// Parse a directory listing payload
    pub fn decode_entries(payload: &[u8]) -> Result<Vec<DirEntry>> {
        let text = Self::payload_text(payload)?;
        serde_json::from_str(text)
            .map_err(|e| corrupt(format!("invalid directory listing: {}", e)).into())
    }

    /// Encode a binary blob into marker-safe text
    pub fn encode_binary(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    /// Reverse [`MarkerCodec::encode_binary`]; line breaks inserted by the device are ignored
    pub fn decode_binary(payload: &[u8]) -> Result<Vec<u8>> {
        let compact: Vec<u8> = payload
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(&compact)
            .map_err(|e| corrupt(format!("invalid base64: {}", e)).into())
    }

    fn payload_text(payload: &[u8]) -> Result<&str> {
        std::str::from_utf8(payload).map_err(|e| corrupt(format!("payload is not UTF-8: {}", e)).into())
    }
}

/// Incremental frame detection over a buffer that only grows
///
/// Each call only looks at bytes not examined before, keeping collection
/// linear in the response size.
#[derive(Debug)]
pub struct FrameScanner<'a> {
    codec: &'a MarkerCodec,
    payload_start: Option<usize>,
    scanned: usize,
}

impl FrameScanner<'_> {
    /// Feed the whole accumulated buffer; true once a complete frame is present
    pub fn update(&mut self, acc: &[u8]) -> bool {
        let start_tag = self.codec.start.as_bytes();
        let end_tag = self.codec.end.as_bytes();

        let payload_start = match self.payload_start {
            Some(pos) => pos,
            None => {
                let from = self
                    .scanned
                    .saturating_sub(start_tag.len().saturating_sub(1))
                    .min(acc.len());
                match find_bytes(&acc[from..], start_tag) {
                    Some(pos) => {
                        let payload_start = from + pos + start_tag.len();
                        self.payload_start = Some(payload_start);
                        self.scanned = payload_start;
                        payload_start
                    }
                    None => {
                        self.scanned = acc.len();
                        return false;
                    }
                }
            }
        };

        let from = self
            .scanned
            .saturating_sub(end_tag.len().saturating_sub(1))
            .max(payload_start)
            .min(acc.len());
        if find_bytes(&acc[from..], end_tag).is_some() {
            return true;
        }

        self.scanned = acc.len();
        false
    }

    /// True once the start tag has been seen
    pub fn saw_start(&self) -> bool {
        self.payload_start.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_with_noise() {
        let codec = MarkerCodec::default();
        let raw = b"OK\r\nMPY boot\x00<thonny>[1,2]</thonny>\x04\x04>";
        assert_eq!(codec.extract(raw), Some(&b"[1,2]"[..]));
    }

    #[test]
    fn test_extract_first_frame_only() {
        let codec = MarkerCodec::default();
        let raw = b"<thonny>a</thonny><thonny>b</thonny>";
        assert_eq!(codec.extract(raw), Some(&b"a"[..]));
    }

    #[test]
    fn test_end_before_start_is_not_a_frame() {
        let codec = MarkerCodec::default();
        assert!(!codec.contains_frame(b"</thonny> junk <thonny>partial"));
        assert!(codec.contains_frame(b"</thonny> junk <thonny>x</thonny>"));
    }

    #[test]
    fn test_decode_without_markers_is_no_payload() {
        let codec = MarkerCodec::default();
        let cases: [&[u8]; 4] = [b"", b"OK", b"<thonny>unterminated", b"</thonny>"];
        for raw in cases {
            let decoded = codec.decode(raw, Decoding::Entries).unwrap();
            assert!(decoded.is_no_payload());
        }
    }

    #[test]
    fn test_decode_entries() {
        let codec = MarkerCodec::default();
        let raw = br#"OK<thonny>[{"name":"a.py","isDir":false},{"name":"lib","isDir":true}]</thonny>"#;
        let decoded = codec.decode(raw, Decoding::Entries).unwrap();
        assert_eq!(
            decoded,
            Decoded::Entries(vec![DirEntry::new("a.py", false), DirEntry::new("lib", true)])
        );

        let decoded = codec.decode(b"<thonny>[]</thonny>", Decoding::Entries).unwrap();
        assert_eq!(decoded, Decoded::Entries(vec![]));
    }

    #[test]
    fn test_malformed_payload_is_corrupt() {
        let codec = MarkerCodec::default();
        let err = codec
            .decode(b"<thonny>[{\"name\":</thonny>", Decoding::Entries)
            .unwrap_err();
        assert!(matches!(
            err,
            mpyfs_core::Error::Protocol(ProtocolError::CorruptPayload { .. })
        ));

        let err = codec
            .decode(b"<thonny>not*base64</thonny>", Decoding::Binary)
            .unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_binary_error_frame_is_device_reported() {
        let codec = MarkerCodec::default();
        let err = codec
            .decode(b"OK<thonny>![Errno 2] ENOENT</thonny>", Decoding::Binary)
            .unwrap_err();
        match err {
            mpyfs_core::Error::Protocol(ProtocolError::DeviceReported { message, .. }) => {
                assert_eq!(message, "[Errno 2] ENOENT")
            }
            other => panic!("unexpected {:?}", other),
        }

        let decoded = codec
            .decode(b"<thonny>aGVsbG8=\n</thonny>", Decoding::Binary)
            .unwrap();
        assert_eq!(decoded, Decoded::Binary(b"hello".to_vec()));
    }

    #[test]
    fn test_binary_ignores_device_newline() {
        let payload = format!("{}\n", MarkerCodec::encode_binary(b"hello"));
        assert_eq!(
            MarkerCodec::decode_binary(payload.as_bytes()).unwrap(),
            b"hello".to_vec()
        );
    }

    #[test]
    fn test_scanner_across_chunk_boundaries() {
        let codec = MarkerCodec::default();
        let full = b"OK<thonny>payload</thonny>".to_vec();

        let mut scanner = codec.scanner();
        let mut acc = Vec::new();
        let mut done_at = None;
        for (i, byte) in full.iter().enumerate() {
            acc.push(*byte);
            if scanner.update(&acc) {
                done_at = Some(i);
                break;
            }
        }
        assert_eq!(done_at, Some(full.len() - 1));
    }
}
