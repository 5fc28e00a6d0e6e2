//! Cursor over a frame payload, used by frame and discovery record parsers.
//!
//! Every accessor returns `None` when the payload runs out so that parsers can bail
//! out with `?` on truncated input.

use alloc::string::String;
use alloc::vec::Vec;

use crate::address::{XBee16BitAddress, XBee64BitAddress};
use crate::frame::AtName;

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(out)
    }

    pub(crate) fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub(crate) fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        let b = self.take(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn addr16(&mut self) -> Option<XBee16BitAddress> {
        self.u16().map(XBee16BitAddress)
    }

    pub(crate) fn addr64(&mut self) -> Option<XBee64BitAddress> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Some(XBee64BitAddress::from_bytes(raw))
    }

    pub(crate) fn at_name(&mut self) -> Option<AtName> {
        self.take(2).map(|b| AtName([b[0], b[1]]))
    }

    /// Read a NUL-terminated string, consuming the terminator.
    pub(crate) fn cstring(&mut self) -> Option<String> {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|b| *b == 0)?;
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Some(s)
    }

    /// Read a string that is terminated either by NUL or by the end of the payload.
    pub(crate) fn trailing_string(&mut self) -> String {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|b| *b == 0).unwrap_or(rest.len());
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos = (self.pos + end + 1).min(self.data.len());
        s
    }

    pub(crate) fn rest(&mut self) -> Vec<u8> {
        let out = self.data[self.pos..].to_vec();
        self.pos = self.data.len();
        out
    }
}
