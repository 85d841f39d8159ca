//! Driver spawns and manages the receive loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::decoder::{DecodeObserver, Decoder};
use crate::provider::Provider;
use crate::types::{DecodeStats, TelemetryRecord};

/// Consecutive transport failures tolerated before the loop gives up
pub const DEFAULT_MAX_TRANSPORT_ERRORS: u32 = 10;

/// Receive loop settings
#[derive(Debug, Clone, Copy)]
pub struct DriverOptions {
    /// Consecutive transport failures before the loop stops
    pub max_transport_errors: u32,
    /// Base delay of the exponential backoff after a transport failure
    pub backoff_base: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_transport_errors: DEFAULT_MAX_TRANSPORT_ERRORS,
            backoff_base: Duration::from_millis(50),
        }
    }
}

/// Result of spawning the receive loop
pub struct DriverChannels {
    /// Latest decoded record; `None` until the first one, kept after the loop ends
    pub records: watch::Receiver<Option<Arc<TelemetryRecord>>>,
    /// Running counters, updated after every datagram
    pub stats: watch::Receiver<DecodeStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Loop task, finishes once the loop exits
    pub task: JoinHandle<()>,
}

/// Driver spawns the task that owns the provider and runs every datagram
/// through the decoder.
///
/// Decode failures are reported to the observer and counted, never fatal.
/// Transport failures back off exponentially and end the loop after
/// `max_transport_errors` in a row, or immediately if not retryable.
pub struct Driver;

impl Driver {
    /// Spawn the receive loop for the given provider.
    ///
    /// The loop stops when `cancel` fires, the provider is exhausted, or
    /// every record receiver has been dropped.
    pub fn spawn<P, O>(
        provider: P,
        decoder: Decoder,
        observer: O,
        cancel: CancellationToken,
        options: DriverOptions,
    ) -> DriverChannels
    where
        P: Provider,
        O: DecodeObserver,
    {
        let (record_tx, record_rx) = watch::channel(None);
        let (stats_tx, stats_rx) = watch::channel(DecodeStats::default());

        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            Self::receive_task(provider, decoder, observer, record_tx, stats_tx, loop_cancel, options)
                .await;
        });

        DriverChannels { records: record_rx, stats: stats_rx, cancel, task }
    }

    async fn receive_task<P, O>(
        mut provider: P,
        decoder: Decoder,
        observer: O,
        record_tx: watch::Sender<Option<Arc<TelemetryRecord>>>,
        stats_tx: watch::Sender<DecodeStats>,
        cancel: CancellationToken,
        options: DriverOptions,
    ) where
        P: Provider,
        O: DecodeObserver,
    {
        let source = provider.describe();
        info!(%source, "Receive loop started");
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receive loop cancelled");
                    break;
                }
                result = provider.next_datagram() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    error_count = 0;
                    match decoder.decode(datagram.bytes()) {
                        Ok(record) => {
                            stats_tx.send_modify(|stats| stats.record_success());
                            observer.on_record(&datagram, &record);
                            if record_tx.send(Some(Arc::new(record))).is_err() {
                                debug!("Record receivers dropped, shutting down");
                                break;
                            }
                        }
                        Err(err) => {
                            stats_tx.send_modify(|stats| stats.record_failure(&err));
                            observer.on_error(&datagram, &err);
                        }
                    }
                }
                Ok(None) => {
                    info!(%source, "Provider exhausted");
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    stats_tx.send_modify(|stats| stats.transport_errors += 1);
                    error!(
                        "Provider error ({}/{}): {}",
                        error_count, options.max_transport_errors, e
                    );

                    if !e.is_retryable() || error_count >= options.max_transport_errors {
                        error!("Giving up on {}", source);
                        break;
                    }

                    // 100ms, 200ms, ... capped at 32x the base
                    let backoff = options.backoff_base * (1u32 << error_count.min(5));
                    trace!(?backoff, "Backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        let stats = *stats_tx.borrow();
        info!(
            datagrams = stats.datagrams,
            records = stats.records,
            failures = stats.failures(),
            "Receive loop ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedProvider, flight_frame};
    use crate::{TelemetryError, types::RawDatagram};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        records: Mutex<Vec<u64>>,
        errors: Mutex<Vec<(u64, String)>>,
    }

    impl DecodeObserver for Recorder {
        fn on_record(&self, datagram: &RawDatagram, _record: &TelemetryRecord) {
            self.records.lock().unwrap().push(datagram.sequence);
        }

        fn on_error(&self, datagram: &RawDatagram, error: &crate::DecodeError) {
            self.errors.lock().unwrap().push((datagram.sequence, error.stage().to_string()));
        }
    }

    #[tokio::test]
    async fn decode_failures_do_not_stop_the_loop() {
        let provider = ScriptedProvider::datagrams(vec![
            b"hello world".to_vec(),
            flight_frame(&[]),
            vec![0x5E, 0xD5, 0x01],
            flight_frame(&[("Az", -1.6)]),
        ]);
        let observer = Arc::new(Recorder::default());
        let channels = Driver::spawn(
            provider,
            Decoder::flight().unwrap(),
            Arc::clone(&observer),
            CancellationToken::new(),
            DriverOptions::default(),
        );
        let stats = channels.stats.clone();
        channels.task.await.unwrap();

        let stats = *stats.borrow();
        assert_eq!(stats.datagrams, 4);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.sync_not_found, 1);
        assert_eq!(stats.terminator_not_found, 1);
        assert_eq!(observer.records.lock().unwrap().as_slice(), [1, 3]);
        assert_eq!(
            observer.errors.lock().unwrap().as_slice(),
            [(0, "framing".to_string()), (2, "framing".to_string())]
        );
        let last = channels.records.borrow().clone().expect("last record kept after the loop ends");
        assert_eq!(last.f64("Az"), Some(-1.6));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_back_off_and_reset() {
        let provider = ScriptedProvider::new(vec![
            Err(TelemetryError::transport_failed("glitch")),
            Err(TelemetryError::transport_failed("glitch")),
            Ok(flight_frame(&[])),
        ]);
        let channels = Driver::spawn(
            provider,
            Decoder::flight().unwrap(),
            (),
            CancellationToken::new(),
            DriverOptions { max_transport_errors: 3, ..Default::default() },
        );
        let stats = channels.stats.clone();
        channels.task.await.unwrap();

        let stats = *stats.borrow();
        assert_eq!(stats.transport_errors, 2);
        assert_eq!(stats.records, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn too_many_transport_errors_end_the_loop() {
        let mut script: Vec<_> =
            (0..5).map(|_| Err(TelemetryError::transport_failed("down"))).collect();
        script.push(Ok(flight_frame(&[])));

        let channels = Driver::spawn(
            ScriptedProvider::new(script),
            Decoder::flight().unwrap(),
            (),
            CancellationToken::new(),
            DriverOptions { max_transport_errors: 3, ..Default::default() },
        );
        let stats = channels.stats.clone();
        channels.task.await.unwrap();

        let stats = *stats.borrow();
        assert_eq!(stats.transport_errors, 3);
        assert_eq!(stats.records, 0);
    }

    #[tokio::test]
    async fn non_retryable_error_ends_immediately() {
        let provider = ScriptedProvider::new(vec![
            Err(TelemetryError::capture_error("x.cap".into(), 8, "truncated")),
            Ok(flight_frame(&[])),
        ]);
        let channels = Driver::spawn(
            provider,
            Decoder::flight().unwrap(),
            (),
            CancellationToken::new(),
            DriverOptions::default(),
        );
        let stats = channels.stats.clone();
        channels.task.await.unwrap();
        assert_eq!(stats.borrow().transport_errors, 1);
        assert_eq!(stats.borrow().datagrams, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_a_blocked_provider() {
        let cancel = CancellationToken::new();
        let channels = Driver::spawn(
            ScriptedProvider::pending(),
            Decoder::flight().unwrap(),
            (),
            cancel.clone(),
            DriverOptions::default(),
        );
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), channels.task)
            .await
            .expect("loop should stop on cancel")
            .unwrap();
    }
}
