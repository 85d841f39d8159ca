//! Ground station configuration
//!
//! Every key is optional; an empty document yields the flight defaults.
//!
//! ```yaml
//! bind: 127.0.0.1:40868
//! recv_buffer: 1024
//! markers:
//!   sync: [0x5E, 0xD5]
//!   terminator: [0x0D, 0x0A]
//! require_exact_consumption: false
//! update_rate: !max 10
//! max_transport_errors: 10
//! schema:
//!   frame_bits: 16
//!   fields:
//!     - { name: fps, bit_width: 8 }
//!     - { name: volts, bit_width: 8, scale: 10 }
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::codec::FrameMarkers;
use crate::decoder::Decoder;
use crate::driver::{DEFAULT_MAX_TRANSPORT_ERRORS, DriverOptions};
use crate::types::{FrameSchema, SchemaDefinition, UpdateRate};
use crate::{Result, TelemetryError};

/// Port the forwarding shim sends to
pub const DEFAULT_PORT: u16 = 40868;

/// Receive buffer size; flight frames are 20 bytes on the wire
pub const DEFAULT_RECV_BUFFER: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroundlinkConfig {
    /// Local UDP address to listen on
    pub bind: SocketAddr,

    /// Bytes reserved per receive; longer datagrams are truncated
    pub recv_buffer: usize,

    pub markers: FrameMarkers,

    /// Custom field layout; the flight layout when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaDefinition>,

    /// Reject frames whose payload has bits beyond the last field
    pub require_exact_consumption: bool,

    /// Default rate for subscribers that do not pick one
    pub update_rate: UpdateRate,

    /// Consecutive transport failures before the receive loop stops
    pub max_transport_errors: u32,
}

impl Default for GroundlinkConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            recv_buffer: DEFAULT_RECV_BUFFER,
            markers: FrameMarkers::default(),
            schema: None,
            require_exact_consumption: false,
            update_rate: UpdateRate::Native,
            max_transport_errors: DEFAULT_MAX_TRANSPORT_ERRORS,
        }
    }
}

impl GroundlinkConfig {
    /// Load and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "Loaded configuration");
        Self::from_yaml(&yaml)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            if yaml.trim().is_empty() { Self::default() } else { serde_yaml_ng::from_str(yaml)? };
        config.validate()?;
        Ok(config)
    }

    /// Check every setting, building the schema so layout errors surface
    /// before any datagram is received.
    pub fn validate(&self) -> Result<()> {
        if self.recv_buffer == 0 {
            return Err(TelemetryError::config_error("recv_buffer", "must be greater than zero"));
        }
        if self.max_transport_errors == 0 {
            return Err(TelemetryError::config_error(
                "max_transport_errors",
                "must be greater than zero",
            ));
        }
        if self.markers.sync == self.markers.terminator {
            return Err(TelemetryError::config_error(
                "markers",
                "sync marker and terminator must differ",
            ));
        }
        self.schema()?;
        Ok(())
    }

    /// The configured layout, or the flight layout.
    pub fn schema(&self) -> Result<Arc<FrameSchema>> {
        let schema = match &self.schema {
            Some(def) => FrameSchema::try_from(def.clone())?,
            None => FrameSchema::flight()?,
        };
        Ok(Arc::new(schema))
    }

    /// Decoder for the configured schema and markers.
    pub fn decoder(&self) -> Result<Decoder> {
        Ok(Decoder::new(self.schema()?, self.markers)
            .with_exact_consumption(self.require_exact_consumption))
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions { max_transport_errors: self.max_transport_errors, ..Default::default() }
    }

    /// Throttle interval for the default update rate.
    pub fn update_interval(&self) -> Option<Duration> {
        self.update_rate.interval()
    }
}
