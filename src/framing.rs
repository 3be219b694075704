//! KISS stream framing.
//!
//! A TNC in KISS mode emits frames bounded by `0xC0` delimiters. The parser
//! accumulates stream bytes and yields delimiter-terminated segments ready
//! for [`crate::ax25::decode_frame`]. Runs shorter than the minimum
//! structural frame size are resynchronization noise (stray delimiters,
//! inter-frame garbage) and are silently discarded, not errors.

use crate::ax25::MIN_FRAME;
use bytes::{Bytes, BytesMut};
use tracing::warn;

const FEND: u8 = 0xC0;

// Cap against OOM from a stream that never produces a delimiter
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Accumulating KISS frame splitter over raw stream bytes.
pub struct KissParser {
    buffer: BytesMut,
}

impl Default for KissParser {
    fn default() -> Self {
        Self::new()
    }
}

impl KissParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        if self.buffer.len() + data.len() > MAX_BUFFER_SIZE {
            warn!("KISS buffer exceeded {} bytes, resetting", MAX_BUFFER_SIZE);
            self.buffer.clear();
        }
        self.buffer.extend_from_slice(data);
    }

    /// Next delimiter-terminated segment meeting the minimum size, if one is
    /// fully buffered. Returned segments include the trailing delimiter.
    pub fn parse_next(&mut self) -> Option<Bytes> {
        loop {
            let pos = self.buffer.iter().position(|&b| b == FEND)?;
            let segment = self.buffer.split_to(pos + 1);
            if segment.len() < MIN_FRAME {
                // Resync noise
                continue;
            }
            return Some(segment.freeze());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ax25::{decode_frame, encode_command};
    use crate::frame::{Address, Frame, Info};

    fn sample() -> Frame {
        Frame {
            source: Address::new("N0CALL", 9),
            dest: Address::new("APRS", 0),
            path: vec![Address::new("WIDE1", 1)],
            body: Info::from("!4903.50N/07201.75W-test"),
        }
    }

    #[test]
    fn test_partial_delivery() {
        let mut parser = KissParser::new();
        let raw = encode_command(&sample());

        let split = raw.len() / 2;
        parser.push(&raw[..split]);
        assert!(parser.parse_next().is_none());

        parser.push(&raw[split..]);
        let segment = parser.parse_next().unwrap();
        assert_eq!(decode_frame(&segment).unwrap(), sample());
    }

    #[test]
    fn test_noise_discarded() {
        let mut parser = KissParser::new();
        // A lone delimiter and a short garbage run, then a real frame
        parser.push(&[0xC0, 0x01, 0x02, 0xC0]);
        parser.push(&encode_command(&sample()));

        let segment = parser.parse_next().unwrap();
        assert_eq!(decode_frame(&segment).unwrap(), sample());
        assert!(parser.parse_next().is_none());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut parser = KissParser::new();
        let raw = encode_command(&sample());
        let mut stream = Vec::new();
        stream.extend_from_slice(&raw);
        stream.extend_from_slice(&raw);
        parser.push(&stream);

        assert!(parser.parse_next().is_some());
        assert!(parser.parse_next().is_some());
        assert!(parser.parse_next().is_none());
    }

    #[test]
    fn test_buffer_overflow_resets() {
        let mut parser = KissParser::new();
        let garbage = vec![0x00u8; 100_000];
        parser.push(&garbage);
        assert!(parser.parse_next().is_none());

        // Still works after the reset
        parser.push(&encode_command(&sample()));
        assert!(parser.parse_next().is_some());
    }
}
