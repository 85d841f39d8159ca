//! Capture files for offline replay
//!
//! A capture is the 8-byte magic `GLCAPv1\0` followed by one record per
//! datagram:
//!
//! | field          | size | encoding            |
//! |----------------|------|---------------------|
//! | `timestamp_ns` | 8    | u64 LE, since start |
//! | `len`          | 4    | u32 LE              |
//! | `bytes`        | len  | raw datagram        |
//!
//! Timestamps are relative to the first datagram of the session and never
//! decrease.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::{Result, TelemetryError};

/// File signature at offset zero
pub const CAPTURE_MAGIC: &[u8; 8] = b"GLCAPv1\0";

/// Largest datagram a capture record may hold.
pub const MAX_RECORD_LEN: usize = 65_535;

/// One captured datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    /// Time since the start of the capture
    pub timestamp: Duration,
    pub data: Vec<u8>,
}

/// Appends datagrams to a capture file.
pub struct CaptureWriter<W: Write = BufWriter<File>> {
    out: W,
    records: u64,
    last_ns: u64,
}

impl CaptureWriter {
    /// Create (or truncate) a capture file and write the header.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Writing capture");
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CaptureWriter<W> {
    /// Wrap any writer, emitting the header immediately.
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(CAPTURE_MAGIC)?;
        Ok(Self { out, records: 0, last_ns: 0 })
    }

    /// Append one datagram.
    ///
    /// Timestamps earlier than the previous record are clamped forward.
    pub fn append(&mut self, timestamp: Duration, data: &[u8]) -> Result<()> {
        if data.len() > MAX_RECORD_LEN {
            return Err(TelemetryError::config_error(
                "capture",
                format!("datagram of {} bytes exceeds {} byte limit", data.len(), MAX_RECORD_LEN),
            ));
        }
        let timestamp_ns = timestamp.as_nanos().min(u128::from(u64::MAX)) as u64;
        let timestamp_ns = timestamp_ns.max(self.last_ns);

        self.out.write_all(&timestamp_ns.to_le_bytes())?;
        self.out.write_all(&(data.len() as u32).to_le_bytes())?;
        self.out.write_all(data)?;

        self.last_ns = timestamp_ns;
        self.records += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        debug!(records = self.records, "Capture finished");
        Ok(self.out)
    }
}

/// Reads a capture file written by [`CaptureWriter`].
///
/// The whole file is loaded up front; iteration yields records in file
/// order and stops at the first malformed one.
#[derive(Debug)]
pub struct CaptureReader {
    path: PathBuf,
    data: Vec<u8>,
    offset: usize,
    failed: bool,
}

impl CaptureReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data =
            std::fs::read(path).map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_bytes(path, data)
    }

    /// Parse an in-memory capture; `path` is only used in error messages.
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self> {
        let path = path.into();
        if data.len() < CAPTURE_MAGIC.len() || &data[..CAPTURE_MAGIC.len()] != CAPTURE_MAGIC {
            return Err(TelemetryError::capture_error(path, 0, "missing GLCAPv1 header"));
        }
        Ok(Self { path, data, offset: CAPTURE_MAGIC.len(), failed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&[u8]> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(TelemetryError::capture_error(
                self.path.clone(),
                self.offset,
                format!(
                    "truncated {what}: need {len} bytes, {} left",
                    self.data.len() - self.offset
                ),
            ));
        };
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_record(&mut self) -> Result<CaptureRecord> {
        let ts = self.take(8, "timestamp")?;
        let timestamp_ns = u64::from_le_bytes([ts[0], ts[1], ts[2], ts[3], ts[4], ts[5], ts[6], ts[7]]);
        let len = self.take(4, "length")?;
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
        let data = self.take(len, "datagram")?.to_vec();
        Ok(CaptureRecord { timestamp: Duration::from_nanos(timestamp_ns), data })
    }
}

impl Iterator for CaptureReader {
    type Item = Result<CaptureRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }
        let record = self.read_record();
        self.failed = record.is_err();
        Some(record)
    }
}
