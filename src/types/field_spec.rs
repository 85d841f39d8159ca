//! Bit-field descriptors

use serde::{Deserialize, Serialize};

use crate::FieldError;

/// Widest field the bit reader can extract in one read.
pub const MAX_FIELD_BITS: u32 = 64;

fn unit_scale() -> u32 {
    1
}

/// Description of one field in the wire layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field identifier, unique within a schema
    pub name: String,
    /// Number of bits on the wire (1..=64)
    pub bit_width: u32,
    /// Two's-complement interpretation when true
    #[serde(default)]
    pub signed: bool,
    /// Divisor applied after extraction (tenths of a unit use 10)
    #[serde(default = "unit_scale")]
    pub scale: u32,
    /// Consumed from the bitstream but not surfaced in records
    #[serde(default)]
    pub reserved: bool,
}

impl FieldSpec {
    /// An unsigned field with unit scale.
    pub fn unsigned(name: impl Into<String>, bit_width: u32) -> Self {
        Self { name: name.into(), bit_width, signed: false, scale: 1, reserved: false }
    }

    /// A two's-complement field with unit scale.
    pub fn signed(name: impl Into<String>, bit_width: u32) -> Self {
        Self { signed: true, ..Self::unsigned(name, bit_width) }
    }

    /// A reserved field: read past, never reported.
    pub fn reserved(name: impl Into<String>, bit_width: u32) -> Self {
        Self { reserved: true, ..Self::unsigned(name, bit_width) }
    }

    /// Replace the scale divisor.
    pub fn with_scale(mut self, divisor: u32) -> Self {
        self.scale = divisor;
        self
    }

    /// Whether decoded values are divided at all.
    pub fn is_scaled(&self) -> bool {
        self.scale != 1
    }

    /// Check width and divisor are usable by the unpacker.
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.bit_width == 0 || self.bit_width > MAX_FIELD_BITS {
            return Err(FieldError::InvalidWidth {
                field: self.name.clone(),
                width: self.bit_width,
            });
        }
        if self.scale == 0 {
            return Err(FieldError::ZeroScale { field: self.name.clone() });
        }
        Ok(())
    }

    /// Smallest raw value this field can carry.
    pub fn raw_min(&self) -> i128 {
        if self.signed { -(1i128 << (self.bit_width - 1)) } else { 0 }
    }

    /// Largest raw value this field can carry.
    pub fn raw_max(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bit_width - 1)) - 1
        } else {
            (1i128 << self.bit_width) - 1
        }
    }
}
