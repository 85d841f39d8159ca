//! MSB-first bit reader

use crate::FieldError;

/// Reads fixed-width integers from a big-endian bitstream.
///
/// Bit 0 is the most significant bit of byte 0. The cursor only moves
/// forward and a read that would run past the end fails without consuming
/// anything.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Total bits in the underlying buffer.
    pub fn total_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// Bits left to read.
    pub fn remaining(&self) -> usize {
        self.total_bits() - self.cursor
    }

    /// Read `width` bits as an unsigned magnitude.
    ///
    /// `field` is only used to label the error.
    pub fn read_unsigned(&mut self, field: &str, width: u32) -> Result<u64, FieldError> {
        self.check(field, width)?;

        let mut value = 0u64;
        let mut left = width as usize;
        while left > 0 {
            let byte = self.data[self.cursor / 8];
            let used = self.cursor % 8;
            let available = 8 - used;
            let take = available.min(left);
            let bits = (byte >> (available - take)) & (0xFF >> (8 - take));

            value = (value << take) | u64::from(bits);
            self.cursor += take;
            left -= take;
        }

        Ok(value)
    }

    /// Read `width` bits as two's complement; the first bit read is the sign.
    pub fn read_signed(&mut self, field: &str, width: u32) -> Result<i64, FieldError> {
        let raw = self.read_unsigned(field, width)?;
        Ok(sign_extend(raw, width))
    }

    fn check(&self, field: &str, width: u32) -> Result<(), FieldError> {
        if width == 0 || width > 64 {
            return Err(FieldError::InvalidWidth { field: field.to_string(), width });
        }
        if (width as usize) > self.remaining() {
            return Err(FieldError::InsufficientBits {
                field: field.to_string(),
                needed: width,
                remaining: self.remaining(),
                bit_offset: self.cursor,
            });
        }
        Ok(())
    }
}

/// Interpret the low `width` bits of `raw` as a two's-complement integer.
///
/// `width` must be in `1..=64`; [`BitReader`] checks it before calling.
pub(crate) fn sign_extend(raw: u64, width: u32) -> i64 {
    debug_assert!((1..=64).contains(&width), "sign_extend width {width}");
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}
