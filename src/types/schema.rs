//! Ordered frame layout

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::FieldSpec;
use crate::FieldError;

/// Declared payload length of the flight frame in bits.
pub const FLIGHT_FRAME_BITS: usize = 128;

/// Field layout emitted by the flight computer, in wire order.
pub fn flight_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::unsigned("fps", 6),
        FieldSpec::unsigned("err", 6),
        FieldSpec::signed("Ax", 6).with_scale(10),
        FieldSpec::signed("Ay", 6).with_scale(10),
        FieldSpec::signed("Az", 9).with_scale(10),
        FieldSpec::signed("Gx", 10),
        FieldSpec::signed("Gy", 10),
        FieldSpec::signed("Gz", 12),
        FieldSpec::signed("roll", 9),
        FieldSpec::signed("pitch", 9),
        FieldSpec::signed("yaw", 9),
        FieldSpec::unsigned("alt", 12),
        FieldSpec::signed("temp", 8),
        FieldSpec::unsigned("volts", 8).with_scale(10),
        FieldSpec::reserved("reserved", 8),
    ]
}

/// Serialized form of a [`FrameSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Fields in wire order
    pub fields: Vec<FieldSpec>,
    /// Declared payload length; defaults to the sum of the widths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_bits: Option<usize>,
}

/// Validated, ordered field layout of one frame payload.
///
/// Field order is the wire order and cannot change after construction. The
/// width sum is checked against the declared frame length once, here, so the
/// per-frame decode path never re-derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDefinition", into = "SchemaDefinition")]
pub struct FrameSchema {
    fields: Vec<FieldSpec>,
    frame_bits: usize,
    /// Record slot to field index, reserved fields excluded
    slots: Vec<usize>,
    /// Field name to record slot
    index: HashMap<String, usize>,
}

impl FrameSchema {
    /// Build a schema, checking widths, names, divisors and total length.
    pub fn new(fields: Vec<FieldSpec>, frame_bits: usize) -> Result<Self, FieldError> {
        let mut seen = HashMap::with_capacity(fields.len());
        let mut slots = Vec::with_capacity(fields.len());
        let mut index = HashMap::with_capacity(fields.len());

        for (position, field) in fields.iter().enumerate() {
            field.validate()?;
            if seen.insert(field.name.clone(), position).is_some() {
                return Err(FieldError::DuplicateField { field: field.name.clone() });
            }
            if !field.reserved {
                index.insert(field.name.clone(), slots.len());
                slots.push(position);
            }
        }

        let actual: usize = fields.iter().map(|f| f.bit_width as usize).sum();
        if actual != frame_bits {
            return Err(FieldError::SchemaLengthMismatch { declared: frame_bits, actual });
        }

        Ok(Self { fields, frame_bits, slots, index })
    }

    /// The flight computer's layout.
    pub fn flight() -> Result<Self, FieldError> {
        Self::new(flight_fields(), FLIGHT_FRAME_BITS)
    }

    /// Fields in wire order, reserved fields included.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Declared payload length in bits.
    pub fn frame_bits(&self) -> usize {
        self.frame_bits
    }

    /// Payload length rounded up to whole bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bits.div_ceil(8)
    }

    /// Number of values a decoded record holds.
    pub fn record_len(&self) -> usize {
        self.slots.len()
    }

    /// Record slot for a field name.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Field stored in a record slot.
    pub fn slot_field(&self, slot: usize) -> Option<&FieldSpec> {
        self.slots.get(slot).and_then(|&position| self.fields.get(position))
    }

    /// Look up a field by name, reserved fields included.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether a reportable field with this name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Bit offset of every field from the start of the payload.
    pub fn offsets(&self) -> impl Iterator<Item = (&FieldSpec, usize)> {
        self.fields.iter().scan(0usize, |offset, field| {
            let start = *offset;
            *offset += field.bit_width as usize;
            Some((field, start))
        })
    }
}

impl TryFrom<SchemaDefinition> for FrameSchema {
    type Error = FieldError;

    fn try_from(def: SchemaDefinition) -> Result<Self, Self::Error> {
        let declared =
            def.frame_bits.unwrap_or_else(|| def.fields.iter().map(|f| f.bit_width as usize).sum());
        FrameSchema::new(def.fields, declared)
    }
}

impl From<FrameSchema> for SchemaDefinition {
    fn from(schema: FrameSchema) -> Self {
        SchemaDefinition { fields: schema.fields, frame_bits: Some(schema.frame_bits) }
    }
}
