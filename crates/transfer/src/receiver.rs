//! Receiving side of a chunked transfer.

use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, trace};

use chunkpipe_protocol::chunk_address;

use crate::limiter::ConcurrencyLimiter;
use crate::serial::SerialExecutor;
use crate::transport::ChunkTransport;
use crate::{TransferConfig, TransferError};

/// Pull-driven stream of reassembled chunks, in chunk-number order.
///
/// Closes after the terminator; a failed fetch is delivered as the final
/// `Err` item. Dropping the stream stops the transfer's generation loop;
/// fetches already in flight are left to finish on their own.
pub struct ChunkStream {
    rx: mpsc::Receiver<Result<Bytes, TransferError>>,
}

impl ChunkStream {
    /// Receives the next chunk; `None` once the stream has closed.
    pub async fn recv(&mut self) -> Option<Result<Bytes, TransferError>> {
        self.rx.recv().await
    }
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, TransferError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Fetches successive chunk addresses and reassembles the byte stream.
pub struct Receiver<T: ChunkTransport + 'static> {
    transport: Arc<T>,
    config: TransferConfig,
}

impl<T: ChunkTransport + 'static> Receiver<T> {
    pub fn new(transport: Arc<T>, config: TransferConfig) -> Self {
        Self { transport, config }
    }

    /// Starts the transfer and returns its output stream.
    ///
    /// Chunk fetches run concurrently under the configured budget and may
    /// complete in any order; delivery to the returned stream is strictly
    /// in chunk-number order. Generation of new fetches halts once the
    /// terminator has been observed, or once the consumer falls a full
    /// delivery window behind.
    pub fn stream(&self) -> ChunkStream {
        let (tx, rx) = mpsc::channel(self.config.concurrency);
        tokio::spawn(generate(
            Arc::clone(&self.transport),
            self.config.path_prefix.clone(),
            self.config.concurrency,
            tx,
        ));
        ChunkStream { rx }
    }
}

/// Generation loop: issue fetches for chunk numbers 1, 2, 3, … and feed
/// their handles, in submission order, to a serial delivery queue.
async fn generate<T: ChunkTransport + 'static>(
    transport: Arc<T>,
    path_prefix: String,
    concurrency: usize,
    tx: mpsc::Sender<Result<Bytes, TransferError>>,
) {
    let limiter = ConcurrencyLimiter::new(concurrency);
    let serial = SerialExecutor::new();
    // Bounds chunks fetched but not yet delivered; when the consumer stops
    // pulling, the window fills and generation stalls with it.
    let window = Arc::new(Semaphore::new(concurrency * 2));
    let done = Arc::new(AtomicBool::new(false));

    for number in 1u64.. {
        if done.load(Ordering::Acquire) {
            break;
        }
        let permit = Arc::clone(&window)
            .acquire_owned()
            .await
            .expect("delivery window semaphore closed");
        // The wait for a window slot can outlive the transfer.
        if done.load(Ordering::Acquire) {
            break;
        }

        let address = chunk_address(&path_prefix, number);
        let fetch = {
            let transport = Arc::clone(&transport);
            let done = Arc::clone(&done);
            async move {
                let body = transport.fetch_chunk(&address).await?;
                if body.is_empty() {
                    // Terminator seen: stop issuing new fetches, even while
                    // earlier-numbered fetches are still in flight. Delivery
                    // ordering is enforced separately below.
                    done.store(true, Ordering::Release);
                }
                Ok::<Bytes, TransferError>(body)
            }
        };
        trace!(number, "requesting chunk");
        let handle = limiter.admit_and_run(fetch).await;

        let tx = tx.clone();
        let done = Arc::clone(&done);
        serial.enqueue(async move {
            let _permit = permit;
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(TransferError::from(join_err)),
            };
            match result {
                Ok(body) if body.is_empty() => {
                    debug!(number, "terminator delivered, closing stream");
                    done.store(true, Ordering::Release);
                    ControlFlow::Break(())
                }
                Ok(body) => {
                    trace!(number, size = body.len(), "delivering chunk");
                    if tx.send(Ok(body)).await.is_err() {
                        // Consumer dropped the stream.
                        done.store(true, Ordering::Release);
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                }
                Err(err) => {
                    debug!(number, error = %err, "chunk fetch failed");
                    done.store(true, Ordering::Release);
                    let _ = tx.send(Err(err)).await;
                    ControlFlow::Break(())
                }
            }
        });
    }
}
