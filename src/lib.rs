//! Ground-station decoder for a rocket telemetry downlink.
//!
//! The flight computer packs sensor readings into a fixed-width bitfield,
//! brackets it with a two-byte sync marker and a CR LF terminator, and a
//! forwarding shim relays each frame to this host as one UDP datagram.
//! Groundlink turns those datagrams back into typed records.
//!
//! # Features
//!
//! - **Two-stage decoding**: [`codec::FrameExtractor`] finds the payload,
//!   [`codec::FieldUnpacker`] reads the fields; each stage fails with its own
//!   error type
//! - **Static schema**: field layout is validated once, before any datagram
//! - **Resilient receive loop**: malformed datagrams are counted and logged,
//!   never fatal
//! - **Capture and replay**: record a session to disk, replay it later at any
//!   speed
//!
//! ## Decoding a single datagram
//!
//! ```rust
//! use groundlink::Decoder;
//!
//! let mut datagram = vec![0x5E, 0xD5];
//! datagram.extend_from_slice(&[0u8; 16]);
//! datagram.extend_from_slice(b"\r\n");
//!
//! let record = Decoder::flight()?.decode(&datagram)?;
//! assert_eq!(record.f64("Az"), Some(0.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Listening on UDP
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use groundlink::{Groundlink, GroundlinkConfig, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> groundlink::Result<()> {
//!     let connection = Groundlink::listen(&GroundlinkConfig::default()).await?;
//!     let mut records = connection.subscribe(UpdateRate::Max(10));
//!
//!     while let Some(record) = records.next().await {
//!         println!("Az: {:?}", record.f64("Az"));
//!     }
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

pub mod capture;
pub mod codec;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod driver;
pub mod logging;
pub mod provider;
pub mod providers;
pub mod stream;

pub use error::*;
pub use types::*;

pub use codec::{FieldUnpacker, FrameExtractor, FrameMarkers, FramePacker};
pub use config::GroundlinkConfig;
pub use connection::Connection;
pub use decoder::{DecodeObserver, Decoder, TracingObserver};

use std::path::Path;

use crate::provider::Provider;
use crate::providers::{ReplayProvider, UdpProvider};

/// Entry point for groundlink connections.
///
/// # Examples
///
/// ## Live downlink
/// ```rust,no_run
/// use groundlink::{Groundlink, GroundlinkConfig};
///
/// #[tokio::main]
/// async fn main() -> groundlink::Result<()> {
///     let config = GroundlinkConfig::load("groundlink.yaml")?;
///     let connection = Groundlink::listen(&config).await?;
///     println!("listening on {:?}", connection.local_addr());
///     Ok(())
/// }
/// ```
///
/// ## Capture replay
/// ```rust,no_run
/// use groundlink::{Groundlink, GroundlinkConfig};
///
/// #[tokio::main]
/// async fn main() -> groundlink::Result<()> {
///     let connection = Groundlink::replay("flight.cap", &GroundlinkConfig::default())?;
///     let stats = connection.finished().await?;
///     println!("{} of {} datagrams decoded", stats.records, stats.datagrams);
///     Ok(())
/// }
/// ```
pub struct Groundlink;

impl Groundlink {
    /// Bind the configured UDP address and start decoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the socket cannot
    /// be bound.
    pub async fn listen(config: &GroundlinkConfig) -> Result<Connection> {
        config.validate()?;
        let provider = UdpProvider::bind(config.bind, config.recv_buffer).await?;
        let local_addr = provider.local_addr()?;
        Ok(Self::from_provider(provider, config, TracingObserver)?.with_local_addr(local_addr))
    }

    /// Replay a capture file at recorded pace.
    pub fn replay<P: AsRef<Path>>(path: P, config: &GroundlinkConfig) -> Result<Connection> {
        config.validate()?;
        Self::from_provider(ReplayProvider::open(path)?, config, TracingObserver)
    }

    /// Start decoding from any provider with a custom observer.
    pub fn from_provider<P, O>(provider: P, config: &GroundlinkConfig, observer: O) -> Result<Connection>
    where
        P: Provider,
        O: DecodeObserver,
    {
        Ok(Connection::start(
            provider,
            config.decoder()?,
            observer,
            config.driver_options(),
            config.update_rate,
        ))
    }
}
