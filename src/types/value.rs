//! Decoded field values

use serde::{Serialize, Serializer};
use std::num::NonZeroU32;

/// Engineering value of one decoded field.
///
/// Scaled values keep the raw integer and its divisor so the fractional part
/// of the division is exact; [`Value::as_f64`] performs the division on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Unsigned field with unit scale
    Unsigned(u64),
    /// Signed field with unit scale
    Signed(i64),
    /// Any field with a divisor other than 1
    Scaled { raw: i128, divisor: NonZeroU32 },
}

impl Value {
    /// Scaled value, or `None` when `divisor` is zero.
    pub fn scaled(raw: i128, divisor: u32) -> Option<Self> {
        NonZeroU32::new(divisor).map(|divisor| Value::Scaled { raw, divisor })
    }

    /// Value after scaling, as a float.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Unsigned(v) => v as f64,
            Value::Signed(v) => v as f64,
            Value::Scaled { raw, divisor } => raw as f64 / f64::from(divisor.get()),
        }
    }

    /// Raw integer as read from the wire, before scaling.
    pub fn raw(&self) -> i128 {
        match *self {
            Value::Unsigned(v) => i128::from(v),
            Value::Signed(v) => i128::from(v),
            Value::Scaled { raw, .. } => raw,
        }
    }

    /// Integer value when no fractional part can exist.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Unsigned(v) => i64::try_from(v).ok(),
            Value::Signed(v) => Some(v),
            Value::Scaled { raw, divisor } if raw % i128::from(divisor.get()) == 0 => {
                i64::try_from(raw / i128::from(divisor.get())).ok()
            }
            Value::Scaled { .. } => None,
        }
    }

    /// Unsigned integer value when non-negative and whole.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Unsigned(v) => Some(v),
            _ => self.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Whether the value carries a divisor.
    pub fn is_scaled(&self) -> bool {
        matches!(self, Value::Scaled { .. })
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Scaled { .. } => write!(f, "{}", self.as_f64()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Value::Unsigned(v) => serializer.serialize_u64(v),
            Value::Signed(v) => serializer.serialize_i64(v),
            Value::Scaled { .. } => serializer.serialize_f64(self.as_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_values_keep_fraction() {
        let az = Value::scaled(-16, 10).unwrap();
        assert_eq!(az.as_f64(), -1.6);
        assert_eq!(az.raw(), -16);
        assert_eq!(az.as_i64(), None);
        assert_eq!(az.to_string(), "-1.6");

        let whole = Value::scaled(250, 10).unwrap();
        assert_eq!(whole.as_i64(), Some(25));
        assert_eq!(whole.as_u64(), Some(25));
    }

    #[test]
    fn zero_divisor_is_unrepresentable() {
        assert_eq!(Value::scaled(5, 0), None);
        let one = Value::scaled(i128::from(i64::MIN), 1).unwrap();
        assert_eq!(one.as_i64(), Some(i64::MIN));
    }

    #[test]
    fn integer_accessors() {
        assert_eq!(Value::Unsigned(u64::MAX).as_i64(), None);
        assert_eq!(Value::Unsigned(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(Value::Signed(-3).as_u64(), None);
        assert_eq!(Value::Signed(-3).as_f64(), -3.0);
        assert!(!Value::Signed(0).is_scaled());
    }

    #[test]
    fn serializes_as_plain_numbers() {
        let json = serde_json::to_string(&[
            Value::Unsigned(7),
            Value::Signed(-2),
            Value::scaled(5, 10).unwrap(),
        ])
        .unwrap();
        assert_eq!(json, "[7,-2,0.5]");
    }
}
