//! Connection handle over a running receive loop

use futures::stream::BoxStream;
use futures::{Stream, StreamExt, stream};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::decoder::{DecodeObserver, Decoder};
use crate::driver::{Driver, DriverOptions};
use crate::provider::Provider;
use crate::stream::ThrottleExt;
use crate::types::{DecodeStats, FrameSchema, TelemetryRecord, UpdateRate};
use crate::{Result, TelemetryError};


/// Handle to a receive loop and the records it decodes.
///
/// Subscribers see the latest record: a slow consumer skips records rather
/// than queueing them. Dropping the connection stops the loop.
pub struct Connection {
    records: watch::Receiver<Option<Arc<TelemetryRecord>>>,
    stats: watch::Receiver<DecodeStats>,
    schema: Arc<FrameSchema>,
    default_rate: UpdateRate,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Spawn the receive loop for `provider` and wrap its channels.
    pub fn start<P, O>(
        provider: P,
        decoder: Decoder,
        observer: O,
        options: DriverOptions,
        default_rate: UpdateRate,
    ) -> Self
    where
        P: Provider,
        O: DecodeObserver,
    {
        let schema = Arc::clone(decoder.schema());
        let channels = Driver::spawn(provider, decoder, observer, CancellationToken::new(), options);
        Self {
            records: channels.records,
            stats: channels.stats,
            schema,
            default_rate,
            local_addr: None,
            cancel: channels.cancel,
            task: Some(channels.task),
        }
    }

    pub(crate) fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Stream of decoded records at most at `rate`.
    ///
    /// Starts with the current record, if any, and ends when the receive
    /// loop stops, after yielding the last record the loop decoded.
    pub fn subscribe(&self, rate: UpdateRate) -> BoxStream<'static, Arc<TelemetryRecord>> {
        let records = latest_records(self.records.clone());
        match rate.interval() {
            None => records.boxed(),
            Some(period) => records.throttle(period).boxed(),
        }
    }

    /// [`Connection::subscribe`] at the configured default rate.
    pub fn records(&self) -> BoxStream<'static, Arc<TelemetryRecord>> {
        self.subscribe(self.default_rate)
    }

    /// Most recent record, if any has been decoded. Kept after the loop ends.
    pub fn latest(&self) -> Option<Arc<TelemetryRecord>> {
        self.records.borrow().clone()
    }

    /// Current counters.
    pub fn stats(&self) -> DecodeStats {
        *self.stats.borrow()
    }

    /// Counters after every datagram (latest-wins).
    pub fn stats_updates(&self) -> impl Stream<Item = DecodeStats> + 'static {
        WatchStream::new(self.stats.clone())
    }

    pub fn schema(&self) -> &Arc<FrameSchema> {
        &self.schema
    }

    /// Bound socket address for UDP connections.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Token that stops the receive loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the receive loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the loop to end on its own (end of a replay, too many
    /// transport failures) and return the final counters.
    pub async fn finished(mut self) -> Result<DecodeStats> {
        self.join().await
    }

    /// Stop the loop and return the final counters.
    pub async fn shutdown(mut self) -> Result<DecodeStats> {
        info!("Shutting down connection");
        self.cancel.cancel();
        self.join().await
    }

    async fn join(&mut self) -> Result<DecodeStats> {
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                TelemetryError::transport_failed_with_source("receive loop task failed", Box::new(e))
            })?;
        }
        Ok(self.stats())
    }
}

/// Latest-wins stream over the record channel.
///
/// Each record is yielded at most once. Once the sender closes, a record the
/// subscriber has not seen yet is still yielded before the stream ends.
fn latest_records(
    mut records: watch::Receiver<Option<Arc<TelemetryRecord>>>,
) -> impl Stream<Item = Arc<TelemetryRecord>> + Send + 'static {
    records.mark_changed();
    stream::unfold(Some((records, None::<Arc<TelemetryRecord>>)), |state| async move {
        let (mut records, mut last) = state?;
        loop {
            let open = records.changed().await.is_ok();
            let current = records.borrow_and_update().clone();
            let unseen =
                current.filter(|record| !last.as_ref().is_some_and(|l| Arc::ptr_eq(l, record)));
            match (unseen, open) {
                (Some(record), true) => {
                    last = Some(Arc::clone(&record));
                    return Some((record, Some((records, last))));
                }
                (Some(record), false) => return Some((record, None)),
                (None, true) => continue,
                (None, false) => return None,
            }
        }
    })
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("Dropping connection");
        self.cancel.cancel();
    }
}
