//! Line framing
//!
//! Converts between discrete text commands and a raw byte stream where each
//! message is terminated by a single `\n`. Decoding tolerates arbitrary
//! read boundaries: bytes after the last terminator are carried over in the
//! partial-line buffer until the rest of the line arrives.

use thiserror::Error;
use tracing::warn;

/// Frame terminator for both directions
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest line accepted, terminator excluded. Longer lines are dropped whole.
pub const MAX_LINE_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("command contains a line terminator")]
    EmbeddedTerminator,
}

/// Frame a single command.
///
/// Surrounding whitespace is trimmed and exactly one terminator appended. A
/// command with an interior terminator is rejected since it would be read
/// back as two commands.
pub fn encode(command: &str) -> Result<Vec<u8>, CodecError> {
    let command = command.trim();
    if command.as_bytes().contains(&LINE_TERMINATOR) {
        return Err(CodecError::EmbeddedTerminator);
    }

    let mut frame = Vec::with_capacity(command.len() + 1);
    frame.extend_from_slice(command.as_bytes());
    frame.push(LINE_TERMINATOR);
    Ok(frame)
}

/// Stateless decode: feed `bytes` on top of `partial`, returning every
/// completed line (trimmed) and the new partial-line buffer.
pub fn decode(bytes: &[u8], partial: Vec<u8>) -> (Vec<String>, Vec<u8>) {
    let mut decoder = LineDecoder { partial };
    let lines = decoder.decode(bytes);
    (lines, decoder.partial)
}

/// Incremental line decoder owning its partial-line state
#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    partial: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume newly arrived bytes and return completed lines in arrival order.
    ///
    /// Lines are whitespace-trimmed; an empty line is returned as `""` and left
    /// for the consumer to discard. Invalid UTF-8 is replaced, not rejected.
    /// A line longer than [`MAX_LINE_LEN`] is discarded up to its terminator.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == LINE_TERMINATOR) {
            self.append(&rest[..pos]);
            if self.partial.len() > MAX_LINE_LEN {
                warn!("Dropping line longer than {} bytes", MAX_LINE_LEN);
            } else {
                lines.push(String::from_utf8_lossy(&self.partial).trim().to_string());
            }
            self.partial.clear();
            rest = &rest[pos + 1..];
        }

        self.append(rest);
        lines
    }

    // Holds at most MAX_LINE_LEN + 1 bytes; the extra byte marks an overlong line
    fn append(&mut self, bytes: &[u8]) {
        let room = (MAX_LINE_LEN + 1).saturating_sub(self.partial.len());
        self.partial.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    /// Bytes received since the last terminator
    pub fn pending(&self) -> &[u8] {
        &self.partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_appends_single_terminator() {
        assert_eq!(encode("MODE:WAVE").unwrap(), b"MODE:WAVE\n".to_vec());
        assert_eq!(encode("  STATUS\r\n").unwrap(), b"STATUS\n".to_vec());
    }

    #[test]
    fn test_encode_rejects_embedded_terminator() {
        assert_eq!(
            encode("MODE:WAVE\nMODE:STOP"),
            Err(CodecError::EmbeddedTerminator)
        );
    }

    #[test]
    fn test_decode_keeps_partial_line() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.decode(b"OK:MO").is_empty());
        assert_eq!(decoder.pending(), b"OK:MO");
        assert_eq!(decoder.decode(b"DE:WAVE\r\nOK:"), vec!["OK:MODE:WAVE"]);
        assert_eq!(decoder.pending(), b"OK:");
    }

    #[test]
    fn test_empty_lines_decode_to_empty_strings() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.decode(b"\n\nSTATUS\n"), vec!["", "", "STATUS"]);
    }

    #[test]
    fn test_split_reads_reassemble_identically() {
        let stream = b"MODE:CONSTANT\r\nINTENSITY:200\n\n  SPEED:150 \nSTATUS\nMODE:WA";
        let (expected, expected_partial) = decode(stream, Vec::new());
        assert_eq!(
            expected,
            vec!["MODE:CONSTANT", "INTENSITY:200", "", "SPEED:150", "STATUS"]
        );

        // Every chunk size, plus two-way splits at every boundary
        for chunk in 1..=stream.len() {
            let mut decoder = LineDecoder::new();
            let lines: Vec<String> = stream
                .chunks(chunk)
                .flat_map(|c| decoder.decode(c))
                .collect();
            assert_eq!(lines, expected, "chunk size {}", chunk);
            assert_eq!(decoder.pending(), expected_partial.as_slice());
        }
        for split in 0..=stream.len() {
            let (mut lines, partial) = decode(&stream[..split], Vec::new());
            let (tail, partial) = decode(&stream[split..], partial);
            lines.extend(tail);
            assert_eq!(lines, expected, "split at {}", split);
            assert_eq!(partial, expected_partial);
        }
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(&[b'O', b'K', 0xFF, b'\n']);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("OK"));
    }

    #[test]
    fn test_overlong_line_is_dropped_with_bounded_buffer() {
        let mut decoder = LineDecoder::new();
        for _ in 0..100 {
            assert!(decoder.decode(&[b'A'; 64]).is_empty());
        }
        assert_eq!(decoder.pending().len(), MAX_LINE_LEN + 1);

        // The tail of the overlong line goes with it; the next line survives
        assert_eq!(decoder.decode(b"AAAA\nSTATUS\n"), vec!["STATUS"]);
        assert!(decoder.pending().is_empty());

        let longest = vec![b'B'; MAX_LINE_LEN];
        let mut framed = longest.clone();
        framed.push(LINE_TERMINATOR);
        assert_eq!(
            decoder.decode(&framed),
            vec![String::from_utf8(longest).unwrap()]
        );
    }
}
