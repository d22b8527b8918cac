//! Line reassembly state machine.
//!
//! Embedded targets print debug text by chopping their output into CAN
//! frames of up to 8 bytes. [`LineAssembler`] glues the payloads back
//! together and cuts lines on NUL, LF and CR.
//!
//! Bytes map to characters by code point (Latin-1), not by UTF-8 decoding,
//! so a multi-byte sequence split across two frames never produces a
//! replacement character.
//!
//! ```
//! use canprintf::assembler::{FlushRequest, LineAssembler};
//!
//! let mut assembler = LineAssembler::new();
//! let out = assembler.ingest(&[b'H', b'i', b'\n', 0, 0, 0, 0, 0], 3).unwrap();
//! assert_eq!(out.lines, vec!["Hi".to_string()]);
//! assert_eq!(out.flush, FlushRequest::Cancel);
//! ```

use std::time::Duration;

use crate::core::error::{PrintfError, Result};
use crate::core::frame::MAX_DATA_LEN;

/// Bytes that close the current line.
pub const TERMINATORS: [u8; 3] = [0x00, b'\n', b'\r'];

/// Idle time after which a line without terminator is flushed anyway.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(1000);

/// What the driver should do with the idle-flush timer after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushRequest {
    /// Buffer holds a partial line: an idle flush must be pending.
    Arm,
    /// Buffer is empty: any pending idle flush is obsolete.
    Cancel,
}

impl FlushRequest {
    fn for_buffer(buffer: &str) -> Self {
        if buffer.is_empty() {
            Self::Cancel
        } else {
            Self::Arm
        }
    }
}

/// Result of feeding the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    /// Completed lines, in order. May contain empty lines.
    pub lines: Vec<String>,
    /// Timer instruction derived from the buffer state after the call.
    pub flush: FlushRequest,
}

impl Emission {
    /// Whether no line was completed.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Check whether a byte terminates a line.
#[inline]
pub fn is_terminator(byte: u8) -> bool {
    TERMINATORS.contains(&byte)
}

/// Accumulates frame payloads into lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: String,
}

impl LineAssembler {
    /// Create an assembler with an empty line buffer.
    pub fn new() -> Self {
        Self {
            buffer: String::with_capacity(128),
        }
    }

    /// Feed the first `len` bytes of `data`.
    ///
    /// Every terminator emits the current buffer, even when it is empty, so
    /// `"\r\n"` after text yields the text followed by an empty line.
    ///
    /// Returns `PrintfError::InvalidFrameLength` if `len > 8`; the buffer is
    /// left untouched in that case.
    pub fn ingest(&mut self, data: &[u8; MAX_DATA_LEN], len: usize) -> Result<Emission> {
        if len > MAX_DATA_LEN {
            return Err(PrintfError::InvalidFrameLength(len));
        }

        let mut lines = Vec::new();
        for &byte in &data[..len] {
            if is_terminator(byte) {
                lines.push(std::mem::take(&mut self.buffer));
            } else {
                self.buffer.push(char::from(byte));
            }
        }

        Ok(Emission {
            lines,
            flush: FlushRequest::for_buffer(&self.buffer),
        })
    }

    /// Emit the partial line after the idle timeout.
    ///
    /// An empty buffer emits nothing. The flush request is always `Cancel`.
    pub fn force_flush(&mut self) -> Emission {
        let lines = if self.buffer.is_empty() {
            Vec::new()
        } else {
            vec![std::mem::take(&mut self.buffer)]
        };

        Emission {
            lines,
            flush: FlushRequest::Cancel,
        }
    }

    /// Partial line collected so far.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Whether no partial line is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop the partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    /// Pack a payload into a frame data field.
    fn payload(bytes: &[u8]) -> ([u8; 8], usize) {
        let mut data = [0u8; 8];
        data[..bytes.len()].copy_from_slice(bytes);
        (data, bytes.len())
    }

    fn feed(assembler: &mut LineAssembler, bytes: &[u8]) -> Emission {
        let (data, len) = payload(bytes);
        assembler.ingest(&data, len).unwrap()
    }

    // ========== ingest() tests ==========

    #[test]
    fn test_ingest_complete_line() {
        let mut assembler = LineAssembler::new();

        let out = feed(&mut assembler, &[72, 105, 10]);

        assert_eq!(out.lines, vec!["Hi"]);
        assert_eq!(out.flush, FlushRequest::Cancel);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_ingest_without_terminator_requests_arm() {
        let mut assembler = LineAssembler::new();

        for chunk in [&b"Hello, w"[..], b"orld", b"!"] {
            let out = feed(&mut assembler, chunk);
            assert!(out.is_empty());
            assert_eq!(out.flush, FlushRequest::Arm);
        }
        assert_eq!(assembler.pending(), "Hello, world!");
    }

    #[test]
    fn test_ingest_single_nul_emits_empty_line() {
        let mut assembler = LineAssembler::new();

        let out = feed(&mut assembler, &[0]);

        assert_eq!(out.lines, vec![""]);
        assert_eq!(out.flush, FlushRequest::Cancel);
    }

    #[test]
    fn test_ingest_crlf_emits_text_then_empty_line() {
        let mut assembler = LineAssembler::new();

        let out = feed(&mut assembler, b"ok\r\n");

        assert_eq!(out.lines, vec!["ok", ""]);
        assert_eq!(out.flush, FlushRequest::Cancel);
    }

    #[test]
    fn test_ingest_line_spanning_frames() {
        let mut assembler = LineAssembler::new();

        assert!(feed(&mut assembler, b"temp=").is_empty());
        let out = feed(&mut assembler, b"42C\nfan");

        assert_eq!(out.lines, vec!["temp=42C"]);
        assert_eq!(out.flush, FlushRequest::Arm);
        assert_eq!(assembler.pending(), "fan");
    }

    #[test]
    fn test_ingest_multiple_lines_in_one_frame() {
        let mut assembler = LineAssembler::new();

        let out = feed(&mut assembler, b"a\nb\rc\0d");

        assert_eq!(out.lines, vec!["a", "b", "c"]);
        assert_eq!(assembler.pending(), "d");
    }

    #[test]
    fn test_ingest_ignores_bytes_past_length() {
        let mut assembler = LineAssembler::new();
        let data = [b'x', b'y', b'\n', b'z', 0, 0, 0, 0];

        let out = assembler.ingest(&data, 2).unwrap();

        assert!(out.is_empty());
        assert_eq!(assembler.pending(), "xy");
    }

    #[test]
    fn test_ingest_zero_length_keeps_state() {
        let mut assembler = LineAssembler::new();
        feed(&mut assembler, b"abc");

        let out = assembler.ingest(&[b'\n'; 8], 0).unwrap();

        assert!(out.is_empty());
        assert_eq!(out.flush, FlushRequest::Arm);
        assert_eq!(assembler.pending(), "abc");
    }

    #[test]
    fn test_ingest_rejects_invalid_length() {
        let mut assembler = LineAssembler::new();
        feed(&mut assembler, b"keep");

        let result = assembler.ingest(&[b'\n'; 8], 9);

        assert!(matches!(result, Err(PrintfError::InvalidFrameLength(9))));
        assert_eq!(assembler.pending(), "keep");
    }

    #[test]
    fn test_ingest_maps_high_bytes_by_code_point() {
        let mut assembler = LineAssembler::new();

        feed(&mut assembler, &[0xB0, b'C', 0xFF]);

        assert_eq!(assembler.pending(), "\u{B0}C\u{FF}");
    }

    #[test]
    fn test_ingest_reconstructs_all_non_terminator_bytes() {
        let stream: Vec<u8> = (0u8..=255).cycle().take(600).collect();
        let mut assembler = LineAssembler::new();
        let mut lines = Vec::new();

        for chunk in stream.chunks(8) {
            lines.extend(feed(&mut assembler, chunk).lines);
        }

        let terminators = stream.iter().filter(|b| is_terminator(**b)).count();
        assert_eq!(lines.len(), terminators);

        let mut rebuilt: String = lines.concat();
        rebuilt.push_str(assembler.pending());
        let expected: String = stream
            .iter()
            .filter(|b| !is_terminator(**b))
            .map(|b| char::from(*b))
            .collect();
        assert_eq!(rebuilt, expected);
    }

    // ========== force_flush() tests ==========

    #[test]
    fn test_force_flush_emits_partial_line() {
        let mut assembler = LineAssembler::new();
        feed(&mut assembler, &[72, 105]);

        let out = assembler.force_flush();

        assert_eq!(out.lines, vec!["Hi"]);
        assert_eq!(out.flush, FlushRequest::Cancel);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_force_flush_on_empty_buffer_emits_nothing() {
        let mut assembler = LineAssembler::new();

        let out = assembler.force_flush();

        assert!(out.is_empty());
        assert_eq!(out.flush, FlushRequest::Cancel);
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut assembler = LineAssembler::new();
        feed(&mut assembler, b"junk");

        assembler.reset();

        assert!(assembler.is_empty());
        assert!(assembler.force_flush().is_empty());
    }
}
