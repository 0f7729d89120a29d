//! The 4-byte SHTP frame header.
//!
//! Layout (little-endian where multi-byte):
//!
//! ```notrust
//! byte 0        byte 1                 byte 2      byte 3
//! +-----------+-----------------------+-----------+-----------+
//! | length lo | length hi (7b) | cont | channel    | sequence  |
//! +-----------+-----------------------+-----------+-----------+
//! ```
//!
//! `length` is the total frame length, header included. Its top bit (bit 15 of the 16-bit field,
//! i.e. the high bit of byte 1) is instead used as the continuation flag: clear on the first
//! fragment of a payload, set on every subsequent fragment.

use byteorder::{ByteOrder, LittleEndian};

/// Size in bytes of the frame header that precedes every transfer.
pub(crate) const HEADER_LEN: usize = 4;

/// Mask isolating the 15-bit length field out of the little-endian 16-bit length/continuation
/// word.
const LENGTH_MASK: u16 = 0x7FFF;

/// The continuation bit, bit 15 of the length/continuation word.
const CONTINUATION_BIT: u16 = 0x8000;

/// A parsed SHTP frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    /// Total frame length, header included.
    pub length: u16,
    /// Whether this frame continues a previously started payload.
    pub continuation: bool,
    /// Destination channel.
    pub channel: u8,
    /// Per-channel sequence number of this fragment.
    pub sequence: u8,
}

impl FrameHeader {
    /// Parses a header from the first [`HEADER_LEN`] bytes of `bytes`.
    ///
    /// Panics if `bytes` is shorter than `HEADER_LEN`; callers must check the short-fragment case
    /// first.
    pub fn parse(bytes: &[u8]) -> Self {
        let word = LittleEndian::read_u16(&bytes[0..2]);
        FrameHeader {
            length: word & LENGTH_MASK,
            continuation: word & CONTINUATION_BIT != 0,
            channel: bytes[2],
            sequence: bytes[3],
        }
    }

    /// Writes this header into the first [`HEADER_LEN`] bytes of `buf`.
    ///
    /// Panics if `buf` is shorter than `HEADER_LEN`, or if `length` does not fit in 15 bits.
    pub fn write(&self, buf: &mut [u8]) {
        assert!(self.length & CONTINUATION_BIT == 0, "frame length overflow");
        let mut word = self.length;
        if self.continuation {
            word |= CONTINUATION_BIT;
        }
        LittleEndian::write_u16(&mut buf[0..2], word);
        buf[2] = self.channel;
        buf[3] = self.sequence;
    }
}
