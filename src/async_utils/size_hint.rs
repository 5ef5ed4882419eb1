//! Stream length tracking for progress reporting.
//!
//! Our input readers learn how many records a file holds from a counting
//! pre-pass, but the adapters between reading and processing don't preserve
//! [`futures::Stream::size_hint`]. This wrapper carries an externally
//! supplied estimate and counts it down as items are yielded, so progress
//! bars built from the hint stay accurate.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;

/// A stream wrapper with an externally supplied length estimate, counted
/// down as items are yielded.
pub struct KnownLenStream<S> {
    inner: S,
    remaining: (usize, Option<usize>),
}

impl<S> Stream for KnownLenStream<S>
where
    S: Stream + Send + Unpin + 'static,
    S::Item: Send + Unpin + 'static,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(_)) = &polled {
            let (lower, upper) = this.remaining;
            // Saturating, because the estimate may undercount.
            this.remaining =
                (lower.saturating_sub(1), upper.map(|n| n.saturating_sub(1)));
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.remaining
    }
}

/// Extension adding [`KnownLenStream`] wrapping to any stream.
pub trait KnownLenStreamExt: Stream + Sized {
    /// Attach a length estimate to this stream.
    fn with_len_hint(self, len_hint: (usize, Option<usize>)) -> KnownLenStream<Self> {
        KnownLenStream {
            inner: self,
            remaining: len_hint,
        }
    }
}

impl<S> KnownLenStreamExt for S where S: Stream {}
