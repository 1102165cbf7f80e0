//! Bit-addressable cursor over a feed buffer.
//!
//! Fields in the feed are packed without byte alignment, most significant
//! bit first. `BitCursor` reads them straight out of the byte slice, either
//! at an absolute bit offset or sequentially from its current position.

use crate::types::{PewsError, Result};

/// Widest field a single read can return.
pub const MAX_FIELD_BITS: usize = 64;

/// Read-only, MSB-first bit view over a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct BitCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        BitCursor { buf, pos: 0 }
    }

    /// Underlying bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Total length of the buffer in bits.
    pub fn bit_len(&self) -> usize {
        self.buf.len() * 8
    }

    /// Current sequential read position, in bits.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bits left between the current position and the end of the buffer.
    pub fn remaining_bits(&self) -> usize {
        self.bit_len().saturating_sub(self.pos)
    }

    /// Move the sequential position to an absolute bit offset.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        self.check(offset, 0)?;
        self.pos = offset;
        Ok(())
    }

    /// Read `width` bits starting at absolute bit `offset` as an unsigned integer.
    ///
    /// Does not move the sequential position.
    pub fn read_uint(&self, offset: usize, width: usize) -> Result<u64> {
        if width > MAX_FIELD_BITS {
            return Err(PewsError::InvalidWidth(width));
        }
        self.check(offset, width)?;

        let end = offset + width;
        let mut value = 0u64;
        let mut bit = offset;
        while bit < end {
            let byte = self.buf[bit / 8];
            let used = bit % 8;
            let take = (8 - used).min(end - bit);
            let chunk = (byte >> (8 - used - take)) & (0xFFu8 >> (8 - take));
            value = (value << take) | u64::from(chunk);
            bit += take;
        }
        Ok(value)
    }

    /// Read `width` bits at the current position and advance past them.
    pub fn read(&mut self, width: usize) -> Result<u64> {
        let value = self.read_uint(self.pos, width)?;
        self.pos += width;
        Ok(value)
    }

    /// Read a single bit as a flag and advance.
    pub fn read_flag(&mut self) -> Result<bool> {
        Ok(self.read(1)? == 1)
    }

    /// Advance past `width` bits without decoding them.
    pub fn skip(&mut self, width: usize) -> Result<()> {
        self.check(self.pos, width)?;
        self.pos += width;
        Ok(())
    }

    fn check(&self, offset: usize, width: usize) -> Result<()> {
        let available = self.bit_len();
        match offset.checked_add(width) {
            Some(end) if end <= available => Ok(()),
            _ => Err(PewsError::InsufficientData {
                offset,
                width,
                available,
            }),
        }
    }
}

/// Pack a string of `0`/`1` characters (other characters ignored) into bytes,
/// zero-padding the final byte.
#[cfg(test)]
pub(crate) fn pack_bits(bits: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut n = 0usize;
    for c in bits.chars() {
        let bit = match c {
            '0' => 0u8,
            '1' => 1u8,
            _ => continue,
        };
        if n % 8 == 0 {
            out.push(0);
        }
        if bit == 1 {
            let last = out.len() - 1;
            out[last] |= 0x80 >> (n % 8);
        }
        n += 1;
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
