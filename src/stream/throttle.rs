//! Stream throttling utilities

use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Throttle the stream to emit at most once per `period`.
    ///
    /// Uses "latest-wins" semantics: if several items arrive within one
    /// period, only the latest is emitted when the period ends. An item
    /// arriving after a quiet period goes out immediately.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        period: Duration,
        // Running while the current window is closed to emissions.
        window: Option<Pin<Box<Sleep>>>,
        pending: Option<S::Item>,
        done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        Self { stream, period, window: None, pending: None, done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything ready, keeping only the latest
        while !*this.done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => break,
            }
        }

        if let Some(window) = this.window.as_mut() {
            if window.as_mut().poll(cx).is_pending() {
                // The source is gone; flush what is left without waiting
                if *this.done {
                    return Poll::Ready(this.pending.take());
                }
                return Poll::Pending;
            }
            *this.window = None;
        }

        match this.pending.take() {
            Some(item) => {
                *this.window = Some(Box::pin(tokio::time::sleep_until(Instant::now() + *this.period)));
                Poll::Ready(Some(item))
            }
            None if *this.done => Poll::Ready(None),
            None => Poll::Pending,
        }
    }
}
