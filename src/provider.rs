//! Provider trait for datagram sources

use crate::Result;
use crate::types::RawDatagram;

/// Trait for datagram sources
///
/// Providers abstract over where bytes come from (a UDP socket, a capture
/// file) and handle their own timing internally. The receive loop only ever
/// asks for the next datagram.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Wait for the next datagram
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - New datagram available
    /// - `Ok(None)` - Source exhausted (normal termination)
    /// - `Err(e)` - Transport error; the loop may retry
    async fn next_datagram(&mut self) -> Result<Option<RawDatagram>>;

    /// Short human-readable description of the source for logs
    fn describe(&self) -> String;
}
