//! Framing of API frames on the serial byte stream.
//!
//! ```text
//! +------+--------+--------+------------+-------------+----------+
//! | 0x7E | len_hi | len_lo | frame type | payload ... | checksum |
//! +------+--------+--------+------------+-------------+----------+
//! ```
//!
//! `len` counts the frame type and payload. The checksum is `0xFF` minus the low byte of
//! the sum of the frame type and payload bytes. In escaped mode (API mode 2) any control
//! byte after the start delimiter is sent as `0x7D` followed by the byte XOR `0x20`.
//! Length and checksum always describe the unescaped bytes.

use alloc::vec::Vec;
use log::debug;

use crate::frame::{ApiFrame, FrameError};

pub const START_DELIMITER: u8 = 0x7E;
pub const ESCAPE: u8 = 0x7D;
pub const XON: u8 = 0x11;
pub const XOFF: u8 = 0x13;
const ESCAPE_XOR: u8 = 0x20;

/// Largest amount of frame data that fits in the 16-bit length field.
pub const MAX_FRAME_DATA_LEN: usize = 0xFFFF;

/// Longest frame data the decoder accepts. Radios never send more than this, so a
/// larger length means the delimiter was a stray payload byte.
pub const MAX_RECEIVED_FRAME_DATA_LEN: usize = 2048;

fn needs_escape(b: u8) -> bool {
    matches!(b, START_DELIMITER | ESCAPE | XON | XOFF)
}

/// Checksum over unescaped frame data.
pub fn checksum(frame_data: &[u8]) -> u8 {
    0xFF - frame_data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Produce the complete on-wire bytes for one frame.
pub fn encode_frame(frame: &ApiFrame, escaped: bool) -> Vec<u8> {
    encode_frame_data(&frame.to_frame_data(), escaped)
}

/// Wrap already-serialised frame data with delimiter, length and checksum.
pub fn encode_frame_data(frame_data: &[u8], escaped: bool) -> Vec<u8> {
    let len = frame_data.len().min(MAX_FRAME_DATA_LEN) as u16;
    let frame_data = &frame_data[..len as usize];
    let mut out = Vec::with_capacity(frame_data.len() + 8);
    out.push(START_DELIMITER);
    let cs = checksum(frame_data);
    let body = len
        .to_be_bytes()
        .into_iter()
        .chain(frame_data.iter().copied())
        .chain(core::iter::once(cs));
    for b in body {
        if escaped && needs_escape(b) {
            out.push(ESCAPE);
            out.push(b ^ ESCAPE_XOR);
        } else {
            out.push(b);
        }
    }
    out
}

/// Outcome of one attempt to pull a frame out of an `ApiBuffer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    Frame(ApiFrame),
    /// The buffer does not yet hold a complete frame.
    NeedMoreData,
    /// A candidate frame was discarded. Decoding can continue immediately.
    Malformed(FrameError),
}

enum Step {
    Byte(u8),
    NeedMore,
    Interrupted(usize),
}

/// Accumulates received bytes, which may arrive in arbitrary chunks, and yields frames.
#[derive(Debug, Default)]
pub struct ApiBuffer {
    data: Vec<u8>,
    escaped: bool,
}

impl ApiBuffer {
    pub fn new(escaped: bool) -> Self {
        Self {
            data: Vec::with_capacity(256),
            escaped,
        }
    }

    /// Add received bytes to the end of the buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn buffered_len(&self) -> usize {
        self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Return the next valid frame, silently skipping any that are corrupt.
    pub fn next_frame(&mut self) -> Option<ApiFrame> {
        loop {
            match self.decode() {
                DecodeResult::Frame(f) => return Some(f),
                DecodeResult::NeedMoreData => return None,
                DecodeResult::Malformed(e) => debug!("dropping malformed API frame: {e:?}"),
            }
        }
    }

    /// Try to decode one frame from the front of the buffer.
    pub fn decode(&mut self) -> DecodeResult {
        match self.data.iter().position(|b| *b == START_DELIMITER) {
            Some(start) => {
                self.data.drain(..start);
            }
            None => {
                self.data.clear();
                return DecodeResult::NeedMoreData;
            }
        }

        let mut pos = 1;
        let mut header = [0u8; 2];
        for b in header.iter_mut() {
            match self.read_byte(&mut pos) {
                Step::Byte(v) => *b = v,
                Step::NeedMore => return DecodeResult::NeedMoreData,
                Step::Interrupted(at) => return self.interrupted(at),
            }
        }
        let len = u16::from_be_bytes(header) as usize;
        if len > MAX_RECEIVED_FRAME_DATA_LEN {
            self.data.drain(..1);
            return DecodeResult::Malformed(FrameError::TooLong(len));
        }

        let mut frame_data = Vec::with_capacity(len);
        for _ in 0..len {
            match self.read_byte(&mut pos) {
                Step::Byte(v) => frame_data.push(v),
                Step::NeedMore => return DecodeResult::NeedMoreData,
                Step::Interrupted(at) => return self.interrupted(at),
            }
        }
        let received = match self.read_byte(&mut pos) {
            Step::Byte(v) => v,
            Step::NeedMore => return DecodeResult::NeedMoreData,
            Step::Interrupted(at) => return self.interrupted(at),
        };

        let expected = checksum(&frame_data);
        if received != expected {
            // Only the delimiter is consumed; a real frame may start inside the candidate.
            self.data.drain(..1);
            return DecodeResult::Malformed(FrameError::ChecksumMismatch {
                expected,
                actual: received,
            });
        }
        self.data.drain(..pos);
        match ApiFrame::parse(&frame_data) {
            Ok(frame) => DecodeResult::Frame(frame),
            Err(e) => DecodeResult::Malformed(e),
        }
    }

    fn read_byte(&self, pos: &mut usize) -> Step {
        let Some(&b) = self.data.get(*pos) else {
            return Step::NeedMore;
        };
        if !self.escaped {
            *pos += 1;
            return Step::Byte(b);
        }
        match b {
            START_DELIMITER => Step::Interrupted(*pos),
            ESCAPE => match self.data.get(*pos + 1) {
                Some(&START_DELIMITER) => Step::Interrupted(*pos + 1),
                Some(&next) => {
                    *pos += 2;
                    Step::Byte(next ^ ESCAPE_XOR)
                }
                None => Step::NeedMore,
            },
            _ => {
                *pos += 1;
                Step::Byte(b)
            }
        }
    }

    fn interrupted(&mut self, at: usize) -> DecodeResult {
        self.data.drain(..at);
        DecodeResult::Malformed(FrameError::Interrupted)
    }
}
