//! Receive loop counters

use serde::Serialize;

use crate::{DecodeError, FieldError, FrameError};

/// Running totals kept by the receive loop.
///
/// Every datagram lands in exactly one bucket: a decoded record or one of the
/// failure classes, so `datagrams == records + failures()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub datagrams: u64,
    pub records: u64,
    pub sync_not_found: u64,
    pub terminator_not_found: u64,
    pub insufficient_bits: u64,
    pub trailing_bits: u64,
    pub other_field_errors: u64,
    /// Receive failures reported by the transport (not datagrams)
    pub transport_errors: u64,
}

impl DecodeStats {
    /// Count a successful decode.
    pub fn record_success(&mut self) {
        self.datagrams += 1;
        self.records += 1;
    }

    /// Count a rejected datagram under its failure class.
    pub fn record_failure(&mut self, error: &DecodeError) {
        self.datagrams += 1;
        match error {
            DecodeError::Frame(FrameError::SyncNotFound { .. }) => self.sync_not_found += 1,
            DecodeError::Frame(FrameError::TerminatorNotFound { .. }) => {
                self.terminator_not_found += 1
            }
            DecodeError::Field(FieldError::InsufficientBits { .. }) => self.insufficient_bits += 1,
            DecodeError::Field(FieldError::TrailingBits { .. }) => self.trailing_bits += 1,
            DecodeError::Field(_) => self.other_field_errors += 1,
        }
    }

    /// Datagrams that did not produce a record.
    pub fn failures(&self) -> u64 {
        self.sync_not_found
            + self.terminator_not_found
            + self.insufficient_bits
            + self.trailing_bits
            + self.other_field_errors
    }

    /// Fraction of datagrams that decoded, or `None` before the first one.
    pub fn success_ratio(&self) -> Option<f64> {
        (self.datagrams > 0).then(|| self.records as f64 / self.datagrams as f64)
    }
}
