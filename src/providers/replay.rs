//! Replay provider for capture files

use std::path::Path;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::Result;
use crate::capture::CaptureReader;
use crate::provider::Provider;
use crate::types::RawDatagram;

/// Lowest and highest accepted playback speed multipliers
pub const SPEED_RANGE: (f64, f64) = (0.1, 100.0);

/// Replays a capture file, pacing datagrams by their recorded timestamps.
pub struct ReplayProvider {
    reader: CaptureReader,

    /// Playback speed multiplier; `None` replays as fast as possible
    speed: Option<f64>,

    /// Wall-clock instant matching capture time zero
    started: Option<Instant>,

    sequence: u64,
    description: String,
}

impl ReplayProvider {
    /// Open a capture file for real-time playback.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = CaptureReader::open(path)?;
        info!(path = %reader.path().display(), "Opened capture for replay");
        Ok(Self::from_reader(reader))
    }

    pub fn from_reader(reader: CaptureReader) -> Self {
        let description = format!("replay://{}", reader.path().display());
        Self { reader, speed: Some(1.0), started: None, sequence: 0, description }
    }

    /// Set playback speed (1.0 = recorded pace), clamped to [`SPEED_RANGE`].
    pub fn with_speed(mut self, speed: f64) -> Self {
        let speed = if speed.is_nan() { 1.0 } else { speed };
        let speed = speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        debug!("Playback speed set to {}x", speed);
        self.speed = Some(speed);
        self
    }

    /// Ignore recorded timestamps and deliver datagrams back to back.
    pub fn unpaced(mut self) -> Self {
        self.speed = None;
        self
    }

    pub fn speed(&self) -> Option<f64> {
        self.speed
    }
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    async fn next_datagram(&mut self) -> Result<Option<RawDatagram>> {
        let record = match self.reader.next() {
            Some(record) => record?,
            None => {
                debug!(datagrams = self.sequence, "Reached end of replay");
                return Ok(None);
            }
        };

        if let Some(speed) = self.speed {
            let started = *self.started.get_or_insert_with(Instant::now);
            let due = started + record.timestamp.div_f64(speed);
            tokio::time::sleep_until(due).await;
        }

        let sequence = self.sequence;
        self.sequence += 1;
        trace!(sequence, len = record.data.len(), at = ?record.timestamp, "Replaying datagram");

        Ok(Some(RawDatagram::new(record.data, sequence, None)))
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
