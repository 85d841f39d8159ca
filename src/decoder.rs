//! Datagram decoding pipeline and failure reporting

use std::sync::Arc;
use tracing::{trace, warn};

use crate::codec::{FieldUnpacker, FrameExtractor, FrameMarkers};
use crate::types::{FrameSchema, RawDatagram, TelemetryRecord};
use crate::{DecodeError, FieldError};

/// Extractor and unpacker composed into one stateless decode call.
///
/// A decoder is cheap to clone and holds nothing that changes between
/// datagrams; the only mutable state, the bit cursor, lives inside a single
/// [`Decoder::decode`] call.
#[derive(Debug, Clone)]
pub struct Decoder {
    extractor: FrameExtractor,
    unpacker: FieldUnpacker,
    exact: bool,
}

impl Decoder {
    pub fn new(schema: Arc<FrameSchema>, markers: FrameMarkers) -> Self {
        Self {
            extractor: FrameExtractor::new(markers),
            unpacker: FieldUnpacker::new(schema),
            exact: false,
        }
    }

    /// Decoder for the flight layout with the default markers.
    pub fn flight() -> Result<Self, FieldError> {
        Ok(Self::new(Arc::new(FrameSchema::flight()?), FrameMarkers::default()))
    }

    /// Reject payloads with bits left over after the last field.
    pub fn with_exact_consumption(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn schema(&self) -> &Arc<FrameSchema> {
        self.unpacker.schema()
    }

    pub fn markers(&self) -> FrameMarkers {
        self.extractor.markers()
    }

    /// Decode one raw buffer into a record.
    pub fn decode(&self, buf: &[u8]) -> Result<TelemetryRecord, DecodeError> {
        let payload = self.extractor.extract(buf)?;
        let record = if self.exact {
            self.unpacker.unpack_exact(payload)?
        } else {
            self.unpacker.unpack(payload)?
        };
        Ok(record)
    }
}

/// Receives the outcome of every decode attempt in the receive loop.
///
/// Called synchronously from the loop, so implementations should return
/// quickly. Both methods default to doing nothing.
pub trait DecodeObserver: Send + Sync + 'static {
    fn on_record(&self, _datagram: &RawDatagram, _record: &TelemetryRecord) {}

    fn on_error(&self, _datagram: &RawDatagram, _error: &DecodeError) {}
}

/// Observer that ignores everything.
impl DecodeObserver for () {}

/// Logs every rejected datagram once, at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn on_record(&self, datagram: &RawDatagram, record: &TelemetryRecord) {
        trace!(
            sequence = datagram.sequence,
            fields = record.len(),
            unread_bits = record.unread_bits(),
            "Decoded frame"
        );
    }

    fn on_error(&self, datagram: &RawDatagram, error: &DecodeError) {
        warn!(
            sequence = datagram.sequence,
            stage = %error.stage(),
            len = datagram.len(),
            source = ?datagram.source,
            "Discarding datagram: {}",
            error
        );
    }
}

impl<T: DecodeObserver + ?Sized> DecodeObserver for Arc<T> {
    fn on_record(&self, datagram: &RawDatagram, record: &TelemetryRecord) {
        (**self).on_record(datagram, record);
    }

    fn on_error(&self, datagram: &RawDatagram, error: &DecodeError) {
        (**self).on_error(datagram, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameError;
    use proptest::prelude::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0x5E, 0xD5];
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&[0x0D, 0x0A]);
        buf
    }

    #[test]
    fn zero_frame_scenario() {
        let decoder = Decoder::flight().unwrap();
        let record = decoder.decode(&frame(&[0u8; 16])).unwrap();
        for (name, value) in record.iter() {
            assert_eq!(value.as_f64(), 0.0, "field {name} should be zero");
        }
    }

    #[test]
    fn errors_are_classified_by_stage() {
        let decoder = Decoder::flight().unwrap();

        let err = decoder.decode(b"hello world").unwrap_err();
        assert!(matches!(err, DecodeError::Frame(FrameError::SyncNotFound { .. })));

        let err = decoder.decode(&[0x5E, 0xD5, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::Frame(FrameError::TerminatorNotFound { .. })));

        let err = decoder.decode(&frame(&[])).unwrap_err();
        assert!(matches!(err, DecodeError::Field(FieldError::InsufficientBits { .. })));
    }

    #[test]
    fn embedded_terminator_truncates_payload() {
        let mut payload = [0u8; 16];
        payload[5] = 0x0D;
        payload[6] = 0x0A;
        let err = Decoder::flight().unwrap().decode(&frame(&payload)).unwrap_err();
        assert!(matches!(err, DecodeError::Field(FieldError::InsufficientBits { .. })));
    }

    #[test]
    fn exact_consumption_is_opt_in() {
        let lenient = Decoder::flight().unwrap();
        let strict = lenient.clone().with_exact_consumption(true);
        let buf = frame(&[0u8; 17]);

        assert!(lenient.decode(&buf).is_ok());
        assert!(matches!(
            strict.decode(&buf),
            Err(DecodeError::Field(FieldError::TrailingBits { unread: 8, .. }))
        ));
    }

    #[test]
    fn observers_through_arc() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct Collect(Mutex<Vec<String>>);
        impl DecodeObserver for Collect {
            fn on_error(&self, _datagram: &RawDatagram, error: &DecodeError) {
                self.0.lock().unwrap().push(error.stage().to_string());
            }
        }

        let observer = Arc::new(Collect::default());
        let as_dyn: Arc<dyn DecodeObserver> = observer.clone();
        let datagram = RawDatagram::new(b"noise".to_vec(), 0, None);
        let err = Decoder::flight().unwrap().decode(datagram.bytes()).unwrap_err();
        as_dyn.on_error(&datagram, &err);
        TracingObserver.on_error(&datagram, &err);

        assert_eq!(observer.0.lock().unwrap().as_slice(), ["framing"]);
    }

    proptest! {
        #[test]
        fn garbage_never_panics(buf in prop::collection::vec(any::<u8>(), 0..512)) {
            let decoder = Decoder::flight().unwrap().with_exact_consumption(true);
            let _ = decoder.decode(&buf);
        }

        #[test]
        fn garbage_around_markers_never_panics(
            head in prop::collection::vec(any::<u8>(), 0..32),
            body in prop::collection::vec(any::<u8>(), 0..32),
        ) {
            let mut buf = head;
            buf.extend_from_slice(&[0x5E, 0xD5]);
            buf.extend_from_slice(&body);
            buf.extend_from_slice(&[0x0D, 0x0A]);
            let result = Decoder::flight().unwrap().decode(&buf);
            let not_missing_sync = !matches!(result, Err(DecodeError::Frame(FrameError::SyncNotFound { .. })));
            prop_assert!(not_missing_sync);
        }
    }
}
