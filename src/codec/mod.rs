//! Wire codec: payload delimiting and bit-field packing.
//!
//! Decoding is two pure stages. [`FrameExtractor`] borrows the payload out of
//! a raw datagram, and [`FieldUnpacker`] reads the schema's fields out of that
//! payload with a [`BitReader`]. Neither stage keeps state between calls, so
//! both are safe to share across threads.
//!
//! ```rust
//! use std::sync::Arc;
//! use groundlink::codec::{FieldUnpacker, FrameExtractor};
//! use groundlink::FrameSchema;
//!
//! let schema = Arc::new(FrameSchema::flight().unwrap());
//! let mut datagram = vec![0xFF, 0x5E, 0xD5];
//! datagram.extend_from_slice(&[0u8; 16]);
//! datagram.extend_from_slice(b"\r\n");
//!
//! let payload = FrameExtractor::default().extract(&datagram).unwrap();
//! let record = FieldUnpacker::new(schema).unpack(payload).unwrap();
//! assert_eq!(record.f64("volts"), Some(0.0));
//! ```

mod bit_reader;
mod bit_writer;
mod extractor;
mod packer;
mod unpacker;

pub use bit_reader::BitReader;
pub use bit_writer::BitWriter;
pub use extractor::{DEFAULT_SYNC, DEFAULT_TERMINATOR, FrameExtractor, FrameMarkers};
pub use packer::FramePacker;
pub use unpacker::FieldUnpacker;
