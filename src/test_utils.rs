//! Test utilities: frame builders and a scripted provider
//!
//! Shared by unit tests, integration tests and benches.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::Arc;

use crate::codec::{FrameMarkers, FramePacker};
use crate::provider::Provider;
use crate::types::{FrameSchema, RawDatagram, flight_fields};
use crate::{Result, TelemetryError};

/// Packer for the built-in flight layout.
pub fn flight_packer() -> FramePacker {
    let schema = FrameSchema::flight().unwrap_or_else(|e| panic!("flight schema: {e}"));
    FramePacker::new(Arc::new(schema), FrameMarkers::default())
}

/// Engineering values for every flight field, zero unless overridden.
pub fn flight_values(overrides: &[(&str, f64)]) -> Vec<(String, f64)> {
    flight_fields()
        .into_iter()
        .filter(|field| !field.reserved)
        .map(|field| {
            let value = overrides
                .iter()
                .find(|(name, _)| *name == field.name)
                .map_or(0.0, |(_, value)| *value);
            (field.name, value)
        })
        .collect()
}

/// Complete framed flight datagram, zero except for `overrides`.
///
/// Panics if a value is out of range for its field.
pub fn flight_frame(overrides: &[(&str, f64)]) -> Vec<u8> {
    flight_packer()
        .encode_frame(flight_values(overrides))
        .unwrap_or_else(|e| panic!("cannot encode test frame: {e}"))
}

/// A representative frame with every field non-zero.
pub fn sample_frame() -> Vec<u8> {
    flight_frame(&[
        ("fps", 42.0),
        ("err", 3.0),
        ("Ax", -3.2),
        ("Ay", 3.1),
        ("Az", 9.8),
        ("Gx", -512.0),
        ("Gy", 511.0),
        ("Gz", -2000.0),
        ("roll", -180.0),
        ("pitch", 45.0),
        ("yaw", 255.0),
        ("alt", 3200.0),
        ("temp", -30.0),
        ("volts", 12.6),
    ])
}

/// Provider that replays a fixed script, then reports exhaustion.
pub struct ScriptedProvider {
    script: VecDeque<Result<Vec<u8>>>,
    sequence: u64,
    hang: bool,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Vec<u8>>>) -> Self {
        Self { script: script.into(), sequence: 0, hang: false }
    }

    /// Script of datagrams only.
    pub fn datagrams(datagrams: Vec<Vec<u8>>) -> Self {
        Self::new(datagrams.into_iter().map(Ok).collect())
    }

    /// Provider that never yields anything.
    pub fn pending() -> Self {
        Self { script: VecDeque::new(), sequence: 0, hang: true }
    }

    /// Keep the source open after the script runs out instead of ending it.
    pub fn then_hang(mut self) -> Self {
        self.hang = true;
        self
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    async fn next_datagram(&mut self) -> Result<Option<RawDatagram>> {
        match self.script.pop_front() {
            Some(Ok(bytes)) => {
                let sequence = self.sequence;
                self.sequence += 1;
                Ok(Some(RawDatagram::new(bytes, sequence, None)))
            }
            Some(Err(e)) => Err(e),
            None if self.hang => std::future::pending().await,
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Script entry for a transport glitch.
pub fn glitch() -> Result<Vec<u8>> {
    Err(TelemetryError::transport_failed("scripted glitch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;

    #[test]
    fn builders_produce_decodable_frames() {
        let decoder = Decoder::flight().unwrap();
        let record = decoder.decode(&sample_frame()).unwrap();
        assert_eq!(record.f64("volts"), Some(12.6));
        assert_eq!(record.i64("Gz"), Some(-2000));

        let zero = flight_frame(&[]);
        assert_eq!(zero.len(), 20);
        assert_eq!(&zero[..2], &[0x5E, 0xD5]);
    }

    #[tokio::test]
    async fn scripted_provider_plays_back_then_ends() {
        let mut provider = ScriptedProvider::new(vec![Ok(vec![1]), glitch()]);
        assert_eq!(provider.next_datagram().await.unwrap().unwrap().bytes(), &[1]);
        assert!(provider.next_datagram().await.is_err());
        assert!(provider.next_datagram().await.unwrap().is_none());
    }
}
