//! Error types for telemetry reception and decoding.
//!
//! Errors are split by how far they travel:
//!
//! - [`FrameError`] and [`FieldError`] describe why a single datagram could not
//!   be decoded. They are wrapped in [`DecodeError`], reported to the observer,
//!   counted, and the receive loop moves on.
//! - [`TelemetryError`] covers everything that happens around decoding:
//!   binding sockets, reading capture files, loading configuration, and the
//!   configuration-time schema checks that must stop the process before the
//!   receive loop starts.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use groundlink::TelemetryError;
//!
//! let error = TelemetryError::transport_failed("socket closed");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```
//!
//! ## Per-datagram failures
//!
//! ```rust
//! use groundlink::{DecodeError, DecodeStage, FrameError};
//!
//! let error = DecodeError::from(FrameError::SyncNotFound { marker: [0x5E, 0xD5], searched: 12 });
//! assert_eq!(error.stage(), DecodeStage::Framing);
//! assert!(!error.is_fatal());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Failure to isolate a payload from a raw datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("sync marker {marker:02X?} not found in {searched} bytes")]
    SyncNotFound { marker: [u8; 2], searched: usize },

    #[error(
        "terminator {marker:02X?} not found after sync at offset {sync_offset} ({searched} bytes searched)"
    )]
    TerminatorNotFound { marker: [u8; 2], sync_offset: usize, searched: usize },
}

/// Failure while unpacking bit fields, or while validating a field layout.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FieldError {
    #[error(
        "field '{field}' needs {needed} bits at bit {bit_offset} but only {remaining} remain"
    )]
    InsufficientBits { field: String, needed: u32, remaining: usize, bit_offset: usize },

    #[error("schema fields sum to {actual} bits but the frame declares {declared} bits")]
    SchemaLengthMismatch { declared: usize, actual: usize },

    #[error("{unread} payload bits left unread after consuming {consumed}")]
    TrailingBits { consumed: usize, unread: usize },

    #[error("field '{field}' has invalid bit width {width} (expected 1..=64)")]
    InvalidWidth { field: String, width: u32 },

    #[error("field '{field}' appears more than once in the schema")]
    DuplicateField { field: String },

    #[error("field '{field}' has a zero scale divisor")]
    ZeroScale { field: String },

    #[error("value {value} for field '{field}' is outside [{min}, {max}]")]
    ValueOutOfRange { field: String, value: f64, min: f64, max: f64 },

    #[error("no value supplied for field '{field}'")]
    MissingValue { field: String },

    #[error("field '{field}' is not part of the schema")]
    UnknownField { field: String },
}

impl FieldError {
    /// Whether this error can only come from a broken layout definition.
    ///
    /// Fatal errors are raised while building a [`crate::FrameSchema`] and
    /// must stop startup; they are never produced by a single bad datagram.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FieldError::SchemaLengthMismatch { .. }
                | FieldError::InvalidWidth { .. }
                | FieldError::DuplicateField { .. }
                | FieldError::ZeroScale { .. }
        )
    }
}

/// Stage of the decode pipeline that rejected a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStage {
    /// Locating the sync marker and terminator.
    Framing,
    /// Reading bit fields out of the payload.
    Unpacking,
}

impl std::fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeStage::Framing => f.write_str("framing"),
            DecodeStage::Unpacking => f.write_str("unpacking"),
        }
    }
}

/// Classified failure to decode one datagram.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("framing failed: {0}")]
    Frame(#[from] FrameError),

    #[error("unpacking failed: {0}")]
    Field(#[from] FieldError),
}

impl DecodeError {
    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> DecodeStage {
        match self {
            DecodeError::Frame(_) => DecodeStage::Framing,
            DecodeError::Field(_) => DecodeStage::Unpacking,
        }
    }

    /// Whether the error points at configuration rather than the datagram.
    pub fn is_fatal(&self) -> bool {
        match self {
            DecodeError::Frame(_) => false,
            DecodeError::Field(err) => err.is_fatal(),
        }
    }
}

/// Main error type for everything around the decode pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Invalid frame schema: {source}")]
    Schema {
        #[from]
        source: FieldError,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Malformed capture file {path} at byte {offset}: {details}")]
    Capture { path: PathBuf, offset: usize, details: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Transport { .. } => true,
            TelemetryError::Decode(err) => !err.is_fatal(),
            TelemetryError::File { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::Schema { .. } => false,
            TelemetryError::Capture { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Transport { .. } => vec![
                "Check that no other process is bound to the receive port",
                "Verify the forwarding shim is running and targets this address",
                "Confirm the bind address exists on this host",
            ],
            TelemetryError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::Config { .. } => vec![
                "Compare the configuration against the documented defaults",
                "Remove unknown keys and fix value types",
            ],
            TelemetryError::Schema { .. } => vec![
                "Make the field widths sum to the declared frame length",
                "Keep every bit width between 1 and 64",
                "Give every field a unique name and a non-zero scale",
            ],
            TelemetryError::Decode(_) => vec![
                "Check the sync marker and terminator match the flight software",
                "Check the field layout matches the flight packer",
            ],
            TelemetryError::Capture { .. } => vec![
                "Verify the file was written by the capture command",
                "Re-capture if the file was truncated",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for capture format errors.
    pub fn capture_error(path: PathBuf, offset: usize, details: impl Into<String>) -> Self {
        TelemetryError::Capture { path, offset, details: details.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Transport { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

impl From<serde_yaml_ng::Error> for TelemetryError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TelemetryError::Config { context: "YAML".to_string(), details: err.to_string() }
    }
}
