//! Payload isolation between sync marker and terminator

use serde::{Deserialize, Serialize};

use crate::FrameError;

/// Sync marker the flight computer places before every payload.
pub const DEFAULT_SYNC: [u8; 2] = [0x5E, 0xD5];

/// Terminator after every payload (CR LF, added by the serial link).
pub const DEFAULT_TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// The two fixed byte pairs that delimit a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMarkers {
    pub sync: [u8; 2],
    pub terminator: [u8; 2],
}

impl Default for FrameMarkers {
    fn default() -> Self {
        Self { sync: DEFAULT_SYNC, terminator: DEFAULT_TERMINATOR }
    }
}

/// Locates the payload inside a raw datagram.
///
/// The buffer may carry leading noise. The first sync marker wins, and the
/// payload ends at the first terminator after it. A false sync inside noise
/// is not retried against a later marker; the frame is simply rejected
/// downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameExtractor {
    markers: FrameMarkers,
}

impl FrameExtractor {
    pub fn new(markers: FrameMarkers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> FrameMarkers {
        self.markers
    }

    /// Borrow the payload bytes strictly between sync and terminator.
    ///
    /// An empty payload (sync immediately followed by terminator) is returned
    /// as an empty slice; rejecting it is the unpacker's job.
    pub fn extract<'a>(&self, buf: &'a [u8]) -> Result<&'a [u8], FrameError> {
        let sync_offset = find(buf, &self.markers.sync).ok_or(FrameError::SyncNotFound {
            marker: self.markers.sync,
            searched: buf.len(),
        })?;

        let start = sync_offset + self.markers.sync.len();
        let rest = &buf[start..];
        let len = find(rest, &self.markers.terminator).ok_or(FrameError::TerminatorNotFound {
            marker: self.markers.terminator,
            sync_offset,
            searched: rest.len(),
        })?;

        Ok(&rest[..len])
    }
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn extractor() -> FrameExtractor {
        FrameExtractor::default()
    }

    #[test]
    fn extracts_payload_after_leading_noise() {
        let buf = [0x00, 0xFF, 0x5E, 0xD5, 0x01, 0x02, 0x03, 0x0D, 0x0A, 0x99];
        assert_eq!(extractor().extract(&buf), Ok(&[0x01, 0x02, 0x03][..]));
    }

    #[test]
    fn empty_buffer_has_no_sync() {
        assert_eq!(
            extractor().extract(&[]),
            Err(FrameError::SyncNotFound { marker: DEFAULT_SYNC, searched: 0 })
        );
    }

    #[test]
    fn half_a_sync_marker_is_not_a_sync() {
        assert!(matches!(
            extractor().extract(&[0x01, 0x5E]),
            Err(FrameError::SyncNotFound { searched: 2, .. })
        ));
    }

    #[test]
    fn missing_terminator() {
        let buf = [0xAA, 0x5E, 0xD5, 0x10, 0x20, 0x0D];
        assert_eq!(
            extractor().extract(&buf),
            Err(FrameError::TerminatorNotFound {
                marker: DEFAULT_TERMINATOR,
                sync_offset: 1,
                searched: 3,
            })
        );
    }

    #[test]
    fn sync_immediately_followed_by_terminator_is_empty_payload() {
        assert_eq!(extractor().extract(&[0x5E, 0xD5, 0x0D, 0x0A]), Ok(&[][..]));
    }

    #[test]
    fn first_sync_and_first_terminator_win() {
        let buf = [0x5E, 0xD5, 0x01, 0x5E, 0xD5, 0x02, 0x0D, 0x0A, 0x03, 0x0D, 0x0A];
        assert_eq!(extractor().extract(&buf), Ok(&[0x01, 0x5E, 0xD5, 0x02][..]));
    }

    #[test]
    fn terminator_search_starts_after_sync() {
        // A terminator before the sync marker is noise.
        let buf = [0x0D, 0x0A, 0x5E, 0xD5, 0x07, 0x0D, 0x0A];
        assert_eq!(extractor().extract(&buf), Ok(&[0x07][..]));
    }

    #[test]
    fn sync_bytes_cannot_double_as_terminator() {
        let markers = FrameMarkers { sync: [0xAB, 0xAB], terminator: [0xAB, 0xCD] };
        let buf = [0xAB, 0xAB, 0xCD];
        assert!(matches!(
            FrameExtractor::new(markers).extract(&buf),
            Err(FrameError::TerminatorNotFound { sync_offset: 0, searched: 1, .. })
        ));
    }

    proptest! {
        #[test]
        fn never_panics_on_arbitrary_input(buf in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = extractor().extract(&buf);
        }

        #[test]
        fn wrapped_payload_without_markers_is_recovered(
            noise in prop::collection::vec(any::<u8>().prop_filter("no sync start", |b| *b != 0x5E), 0..32),
            payload in prop::collection::vec(0x10u8..0x50, 0..32)
        ) {
            let mut buf = noise.clone();
            buf.extend_from_slice(&DEFAULT_SYNC);
            buf.extend_from_slice(&payload);
            buf.extend_from_slice(&DEFAULT_TERMINATOR);

            prop_assert_eq!(extractor().extract(&buf), Ok(&payload[..]));
        }

        #[test]
        fn no_sync_anywhere_is_sync_not_found(buf in prop::collection::vec(0x00u8..0x5E, 0..128)) {
            let is_sync_error = matches!(extractor().extract(&buf), Err(FrameError::SyncNotFound { .. }));
            prop_assert!(is_sync_error);
        }
    }
}
