//! MSB-first bit writer, the inverse of [`super::BitReader`]

/// Appends fixed-width integers to a big-endian bitstream.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self { bytes: Vec::with_capacity(bits.div_ceil(8)), bits: 0 }
    }

    /// Bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bits
    }

    /// Append the low `width` bits of `value`, most significant first.
    ///
    /// Higher bits are masked off, so negative numbers cast to `u64` land as
    /// their two's-complement pattern. Panics if `width` exceeds 64.
    pub fn push_unsigned(&mut self, value: u64, width: u32) {
        assert!(width <= 64, "bit width {width} exceeds 64");
        for i in (0..width).rev() {
            let bit = ((value >> i) & 1) as u8;
            let used = self.bits % 8;
            if used == 0 {
                self.bytes.push(0);
            }
            if bit == 1
                && let Some(last) = self.bytes.last_mut()
            {
                *last |= 0x80 >> used;
            }
            self.bits += 1;
        }
    }

    /// Append `value` as a `width`-bit two's-complement integer.
    pub fn push_signed(&mut self, value: i64, width: u32) {
        self.push_unsigned(value as u64, width);
    }

    /// The written bytes, last byte zero-padded.
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
