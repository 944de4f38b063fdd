//! Byte-counting pass-through for chunk streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

/// Callback invoked with the cumulative byte total after each chunk.
pub type ProgressCallback = Box<dyn Fn(u64) + Send + Sync>;

/// Wraps a chunk stream and reports cumulative bytes observed.
///
/// Chunks pass through unchanged and in order; the callback fires once per
/// chunk with the new running total, which is strictly non-decreasing and
/// ends at the stream's total size.
pub struct ProgressStream<S> {
    inner: S,
    observed: u64,
    callback: ProgressCallback,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, callback: ProgressCallback) -> Self {
        Self {
            inner,
            observed: 0,
            callback,
        }
    }

    /// Cumulative bytes observed so far.
    pub fn observed(&self) -> u64 {
        self.observed
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.observed += chunk.len() as u64;
                (this.callback)(this.observed);
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
