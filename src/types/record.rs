//! Decoded telemetry record

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

use super::{FrameSchema, Value};

/// One successfully decoded frame.
///
/// Values are stored in schema order and looked up by name through the shared
/// schema, so a record is one small allocation regardless of field count. A
/// record is only ever built from a complete unpack; there is no partial form.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    schema: Arc<FrameSchema>,
    values: Vec<Value>,
    consumed_bits: usize,
    payload_bits: usize,
}

impl TelemetryRecord {
    pub(crate) fn new(
        schema: Arc<FrameSchema>,
        values: Vec<Value>,
        consumed_bits: usize,
        payload_bits: usize,
    ) -> Self {
        debug_assert_eq!(values.len(), schema.record_len());
        Self { schema, values, consumed_bits, payload_bits }
    }

    /// Value of a field by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.schema.slot_of(name).and_then(|slot| self.values.get(slot).copied())
    }

    /// Scaled value of a field as a float.
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.as_f64())
    }

    /// Whole value of a field as a signed integer.
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    /// Fields in wire order, reserved fields omitted.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        self.values.iter().enumerate().filter_map(|(slot, value)| {
            self.schema.slot_field(slot).map(|field| (field.name.as_str(), *value))
        })
    }

    /// Number of reported fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bits read from the payload, reserved fields included.
    pub fn consumed_bits(&self) -> usize {
        self.consumed_bits
    }

    /// Total bits the payload carried.
    pub fn payload_bits(&self) -> usize {
        self.payload_bits
    }

    /// Payload bits no field covered.
    pub fn unread_bits(&self) -> usize {
        self.payload_bits - self.consumed_bits
    }

    /// The layout this record was decoded with.
    pub fn schema(&self) -> &Arc<FrameSchema> {
        &self.schema
    }
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
