//! Subscriber update rate

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a subscriber wants to see records.
///
/// Datagram sources have no fixed tick rate, so the rate is an upper bound
/// applied per subscriber rather than a property of the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRate {
    /// Every record as soon as it is decoded
    #[default]
    Native,

    /// At most this many records per second, latest wins
    Max(u32),
}

impl UpdateRate {
    /// Throttle interval, or `None` when no throttling applies.
    ///
    /// `Max(0)` is treated as `Native`.
    pub fn interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_nanos(1_000_000_000 / u64::from(hz))),
        }
    }
}
