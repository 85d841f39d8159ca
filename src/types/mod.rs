//! Core types for telemetry decoding.
//!
//! ## Architecture
//!
//! - [`RawDatagram`] is one transport delivery with receive metadata
//! - [`FieldSpec`] describes one bit field: width, signedness, scale
//! - [`FrameSchema`] is the ordered, validated field layout with O(1) name lookup
//! - [`TelemetryRecord`] holds the decoded [`Value`]s of one frame
//! - [`DecodeStats`] counts outcomes in the receive loop
//!
//! ## Usage Example
//!
//! ```rust
//! use groundlink::types::{FieldSpec, FrameSchema};
//!
//! let schema = FrameSchema::new(
//!     vec![
//!         FieldSpec::unsigned("mode", 4),
//!         FieldSpec::signed("accel", 12).with_scale(10),
//!     ],
//!     16,
//! )
//! .unwrap();
//!
//! assert_eq!(schema.frame_bytes(), 2);
//! assert!(schema.has_field("accel"));
//! ```

mod datagram;
mod field_spec;
mod record;
mod schema;
mod stats;
mod update_rate;
mod value;

pub use datagram::RawDatagram;
pub use field_spec::{FieldSpec, MAX_FIELD_BITS};
pub use record::TelemetryRecord;
pub use schema::{FLIGHT_FRAME_BITS, FrameSchema, SchemaDefinition, flight_fields};
pub use stats::DecodeStats;
pub use update_rate::UpdateRate;
pub use value::Value;
