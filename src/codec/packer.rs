//! Frame encoding, the flight-side counterpart of the decoder
//!
//! The ground station never transmits telemetry, but encoding frames with the
//! exact wire layout is how replays, load tests and the `encode` command
//! produce input the decoder will accept.

use std::collections::HashMap;
use std::sync::Arc;

use super::{BitWriter, FrameMarkers};
use crate::FieldError;
use crate::types::{FieldSpec, FrameSchema, TelemetryRecord};

/// Encodes engineering values into framed datagrams.
#[derive(Debug, Clone)]
pub struct FramePacker {
    schema: Arc<FrameSchema>,
    markers: FrameMarkers,
}

impl FramePacker {
    pub fn new(schema: Arc<FrameSchema>, markers: FrameMarkers) -> Self {
        Self { schema, markers }
    }

    pub fn schema(&self) -> &Arc<FrameSchema> {
        &self.schema
    }

    /// Pack engineering values into a payload.
    ///
    /// Every non-reserved field needs a value. Values are multiplied by the
    /// field's scale and rounded to the nearest raw integer, which must fit
    /// the field width. Reserved fields are written as zero.
    pub fn encode_payload<I, K>(&self, values: I) -> Result<Vec<u8>, FieldError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut by_name = HashMap::new();
        for (name, value) in values {
            let name = name.as_ref();
            if !self.schema.has_field(name) {
                return Err(FieldError::UnknownField { field: name.to_string() });
            }
            by_name.insert(name.to_string(), value);
        }

        let mut writer = BitWriter::with_capacity(self.schema.frame_bits());
        for field in self.schema.fields() {
            if field.reserved {
                writer.push_unsigned(0, field.bit_width);
                continue;
            }
            let value = by_name
                .get(&field.name)
                .copied()
                .ok_or_else(|| FieldError::MissingValue { field: field.name.clone() })?;
            writer.push_unsigned(to_raw(field, value)? as u64, field.bit_width);
        }
        Ok(writer.finish())
    }

    /// Re-encode a decoded record bit for bit.
    pub fn encode_record(&self, record: &TelemetryRecord) -> Result<Vec<u8>, FieldError> {
        let mut writer = BitWriter::with_capacity(self.schema.frame_bits());
        for field in self.schema.fields() {
            if field.reserved {
                writer.push_unsigned(0, field.bit_width);
                continue;
            }
            let raw = record
                .get(&field.name)
                .map(|value| value.raw())
                .ok_or_else(|| FieldError::MissingValue { field: field.name.clone() })?;
            if raw < field.raw_min() || raw > field.raw_max() {
                return Err(out_of_range(field, raw as f64 / f64::from(field.scale)));
            }
            writer.push_unsigned(raw as u64, field.bit_width);
        }
        Ok(writer.finish())
    }

    /// Wrap a payload in the sync marker and terminator.
    pub fn frame(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 4);
        out.extend_from_slice(&self.markers.sync);
        out.extend_from_slice(payload);
        out.extend_from_slice(&self.markers.terminator);
        out
    }

    /// [`FramePacker::encode_payload`] followed by [`FramePacker::frame`].
    pub fn encode_frame<I, K>(&self, values: I) -> Result<Vec<u8>, FieldError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        Ok(self.frame(&self.encode_payload(values)?))
    }
}

fn to_raw(field: &FieldSpec, value: f64) -> Result<i128, FieldError> {
    let scaled = (value * f64::from(field.scale)).round();
    if !scaled.is_finite() {
        return Err(out_of_range(field, value));
    }
    let raw = scaled as i128;
    if raw < field.raw_min() || raw > field.raw_max() {
        return Err(out_of_range(field, value));
    }
    Ok(raw)
}

fn out_of_range(field: &FieldSpec, value: f64) -> FieldError {
    let divisor = f64::from(field.scale);
    FieldError::ValueOutOfRange {
        field: field.name.clone(),
        value,
        min: field.raw_min() as f64 / divisor,
        max: field.raw_max() as f64 / divisor,
    }
}
