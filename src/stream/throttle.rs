//! Latest-wins rate limiting for record streams

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep_until};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`.
    ///
    /// Items arriving while the gate is closed overwrite each other, so the
    /// one emitted when it reopens is always the most recent. The first item
    /// passes straight through, and a held item is flushed when the inner
    /// stream ends.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream returned by [`ThrottleExt::throttle`]
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        #[pin]
        gate: Sleep,
        period: Duration,
        open: bool,
        done: bool,
        pending: Option<S::Item>,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        Self {
            stream,
            gate: sleep_until(Instant::now()),
            period,
            open: true,
            done: false,
            pending: None,
        }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain whatever is ready, keeping only the latest
        while !*this.done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => break,
            }
        }

        if !*this.open && this.gate.as_mut().poll(cx).is_ready() {
            *this.open = true;
        }

        if *this.open
            && let Some(item) = this.pending.take()
        {
            *this.open = false;
            let next = Instant::now() + *this.period;
            this.gate.as_mut().reset(next);
            // Register the new deadline with the waker
            let _ = this.gate.as_mut().poll(cx);
            return Poll::Ready(Some(item));
        }

        if *this.done && this.pending.is_none() {
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}
