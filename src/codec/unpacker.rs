//! Schema-driven field unpacking

use std::num::NonZeroU32;
use std::sync::Arc;

use super::BitReader;
use crate::FieldError;
use crate::types::{FieldSpec, FrameSchema, TelemetryRecord, Value};

/// Turns payload bytes into a [`TelemetryRecord`] following a [`FrameSchema`].
///
/// Unpacking is all-or-nothing: the first field that cannot be read aborts
/// the frame and nothing decoded before it escapes.
#[derive(Debug, Clone)]
pub struct FieldUnpacker {
    schema: Arc<FrameSchema>,
}

impl FieldUnpacker {
    pub fn new(schema: Arc<FrameSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<FrameSchema> {
        &self.schema
    }

    /// Decode every field in schema order.
    ///
    /// Bits left after the last field are allowed; the record reports how
    /// many were consumed so callers can insist on an exact fit.
    pub fn unpack(&self, payload: &[u8]) -> Result<TelemetryRecord, FieldError> {
        let mut reader = BitReader::new(payload);
        let mut values = Vec::with_capacity(self.schema.record_len());

        for field in self.schema.fields() {
            if field.reserved {
                reader.read_unsigned(&field.name, field.bit_width)?;
                continue;
            }
            values.push(read_value(&mut reader, field)?);
        }

        Ok(TelemetryRecord::new(
            Arc::clone(&self.schema),
            values,
            reader.position(),
            reader.total_bits(),
        ))
    }

    /// Like [`FieldUnpacker::unpack`], but unread trailing bits are an error.
    pub fn unpack_exact(&self, payload: &[u8]) -> Result<TelemetryRecord, FieldError> {
        let record = self.unpack(payload)?;
        match record.unread_bits() {
            0 => Ok(record),
            unread => {
                Err(FieldError::TrailingBits { consumed: record.consumed_bits(), unread })
            }
        }
    }
}

fn read_value(reader: &mut BitReader<'_>, field: &FieldSpec) -> Result<Value, FieldError> {
    // Zero scales never reach here: FrameSchema rejects them
    let divisor = NonZeroU32::new(field.scale).filter(|_| field.is_scaled());
    let value = if field.signed {
        let raw = reader.read_signed(&field.name, field.bit_width)?;
        match divisor {
            Some(divisor) => Value::Scaled { raw: i128::from(raw), divisor },
            None => Value::Signed(raw),
        }
    } else {
        let raw = reader.read_unsigned(&field.name, field.bit_width)?;
        match divisor {
            Some(divisor) => Value::Scaled { raw: i128::from(raw), divisor },
            None => Value::Unsigned(raw),
        }
    };
    Ok(value)
}
