//! Sending side of a chunked transfer.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use chunkpipe_protocol::chunk_address;

use crate::limiter::ConcurrencyLimiter;
use crate::transport::ChunkTransport;
use crate::{TransferConfig, TransferError};

/// Drives a source byte stream through the relay as numbered chunks.
pub struct Sender<T: ChunkTransport + 'static> {
    transport: Arc<T>,
    config: TransferConfig,
}

impl<T: ChunkTransport + 'static> Sender<T> {
    pub fn new(transport: Arc<T>, config: TransferConfig) -> Self {
        Self { transport, config }
    }

    /// Sends every chunk of `source`, then the terminator.
    ///
    /// Chunks are numbered from 1 in source order and posted under the
    /// concurrency budget; the zero-length terminator goes to the number
    /// one past the last real chunk (chunk 1 for an empty source). The
    /// call completes once every post, terminator included, has been
    /// acknowledged; the first failed post is returned and the transfer
    /// is left incomplete (no retry, no partial resume).
    ///
    /// A zero-length chunk from `source` is rejected with
    /// [`TransferError::Protocol`]: on the wire it would be
    /// indistinguishable from the terminator and would truncate the
    /// stream on the receiving side.
    ///
    /// Returns the total payload bytes posted.
    pub async fn send<S>(&self, source: S) -> Result<u64, TransferError>
    where
        S: Stream<Item = Result<Bytes, TransferError>> + Send + 'static,
    {
        let limiter = ConcurrencyLimiter::new(self.config.concurrency);
        let mut source = Box::pin(source);
        let mut handles = Vec::new();
        let mut number: u64 = 1;
        let mut total: u64 = 0;

        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                return Err(TransferError::Protocol(
                    "source produced a zero-length chunk, which is reserved for the terminator"
                        .into(),
                ));
            }
            total += chunk.len() as u64;

            let address = chunk_address(&self.config.path_prefix, number);
            let transport = Arc::clone(&self.transport);
            debug!(number, size = chunk.len(), "posting chunk");
            handles.push(
                limiter
                    .admit_and_run(async move { transport.post_chunk(&address, chunk).await })
                    .await,
            );
            number += 1;
        }

        // Terminator: an explicitly empty body one past the last chunk.
        let address = chunk_address(&self.config.path_prefix, number);
        let transport = Arc::clone(&self.transport);
        debug!(number, "posting terminator");
        handles.push(
            limiter
                .admit_and_run(async move { transport.post_chunk(&address, Bytes::new()).await })
                .await,
        );

        for handle in handles {
            handle.await??;
        }
        debug!(chunks = number - 1, total, "transfer sent");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::transport::MemoryRelay;

    fn source(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, TransferError>> + Send {
        futures_util::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn posts_numbered_chunks_and_terminator() {
        let relay = Arc::new(MemoryRelay::new());
        let config = TransferConfig::new("send-test").with_concurrency(2);
        let sender = Sender::new(Arc::clone(&relay), config);

        let total = sender.send(source(&[b"AABB", b"CCDD", b"EE"])).await.unwrap();
        assert_eq!(total, 10);

        assert_eq!(
            &relay.fetch_chunk(&chunk_address("send-test", 1)).await.unwrap()[..],
            b"AABB"
        );
        assert_eq!(
            &relay.fetch_chunk(&chunk_address("send-test", 2)).await.unwrap()[..],
            b"CCDD"
        );
        assert_eq!(
            &relay.fetch_chunk(&chunk_address("send-test", 3)).await.unwrap()[..],
            b"EE"
        );
        let terminator = relay.fetch_chunk(&chunk_address("send-test", 4)).await.unwrap();
        assert!(terminator.is_empty());
        assert_eq!(relay.pending(), 0);
    }

    #[tokio::test]
    async fn empty_source_sends_only_terminator() {
        let relay = Arc::new(MemoryRelay::new());
        let sender = Sender::new(Arc::clone(&relay), TransferConfig::new("empty-test"));

        let total = sender.send(source(&[])).await.unwrap();
        assert_eq!(total, 0);

        // The terminator is chunk 1 and is the only chunk.
        assert_eq!(relay.pending(), 1);
        let terminator = relay.fetch_chunk(&chunk_address("empty-test", 1)).await.unwrap();
        assert!(terminator.is_empty());
    }

    #[tokio::test]
    async fn rejects_empty_source_chunk() {
        let relay = Arc::new(MemoryRelay::new());
        let sender = Sender::new(Arc::clone(&relay), TransferConfig::new("reject-test"));

        let result = sender.send(source(&[b"data", b""])).await;
        assert!(matches!(result, Err(TransferError::Protocol(_))));
    }

    #[tokio::test]
    async fn source_error_aborts_send() {
        let relay = Arc::new(MemoryRelay::new());
        let sender = Sender::new(Arc::clone(&relay), TransferConfig::new("src-err"));

        let failing = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"ok")),
            Err(TransferError::Protocol("source broke".into())),
        ]);
        let result = sender.send(failing).await;
        assert!(matches!(result, Err(TransferError::Protocol(_))));
    }

    struct FailingTransport;

    #[async_trait]
    impl ChunkTransport for FailingTransport {
        async fn post_chunk(&self, _address: &str, _body: Bytes) -> Result<(), TransferError> {
            Err(TransferError::Protocol("post refused".into()))
        }

        async fn fetch_chunk(&self, _address: &str) -> Result<Bytes, TransferError> {
            unreachable!("sender never fetches")
        }
    }

    #[tokio::test]
    async fn post_failure_surfaces_to_caller() {
        let sender = Sender::new(Arc::new(FailingTransport), TransferConfig::new("fail-test"));
        let result = sender.send(source(&[b"data"])).await;
        assert!(matches!(result, Err(TransferError::Protocol(_))));
    }
}
