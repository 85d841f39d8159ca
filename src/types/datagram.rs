//! Raw datagram as handed over by the transport

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// One datagram exactly as received.
///
/// The bytes are immutable and live only as long as the decode attempt that
/// consumes them. Metadata is for diagnostics; decoding never looks at it.
#[derive(Debug, Clone)]
pub struct RawDatagram {
    /// Datagram bytes (shared, never mutated)
    pub data: Arc<[u8]>,

    /// Monotonic receive counter assigned by the provider
    pub sequence: u64,

    /// Sender endpoint, when the transport has one
    pub source: Option<SocketAddr>,

    /// When the datagram was handed to the decoder
    pub received_at: Instant,
}

impl RawDatagram {
    /// Create a datagram stamped with the current instant.
    pub fn new(data: impl Into<Arc<[u8]>>, sequence: u64, source: Option<SocketAddr>) -> Self {
        Self { data: data.into(), sequence, source, received_at: Instant::now() }
    }

    /// Datagram bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
