//! End-to-end transfers over the in-memory relay.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::StreamExt;

use chunkpipe_protocol::chunk_address;
use chunkpipe_transfer::{
    ChunkTransport, FileChunker, MemoryRelay, ProgressStream, Receiver, Sender, TransferConfig,
    TransferError,
};

fn byte_source(
    data: Vec<Vec<u8>>,
) -> impl futures_util::Stream<Item = Result<Bytes, TransferError>> + Send {
    futures_util::stream::iter(data.into_iter().map(|chunk| Ok(Bytes::from(chunk))))
}

fn split(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    data.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

async fn roundtrip(
    data: &[u8],
    chunk_size: usize,
    concurrency: usize,
) -> Result<Vec<u8>, TransferError> {
    let relay = Arc::new(MemoryRelay::new());
    let config = TransferConfig::new("roundtrip")
        .with_chunk_size(chunk_size)
        .with_concurrency(concurrency);

    let sender = Sender::new(Arc::clone(&relay), config.clone());
    let receiver = Receiver::new(Arc::clone(&relay), config);

    let source = byte_source(split(data, chunk_size));
    let send_task = tokio::spawn(async move { sender.send(source).await });

    let mut stream = receiver.stream();
    let mut received = Vec::new();
    while let Some(chunk) = stream.recv().await {
        received.extend_from_slice(&chunk?);
    }

    send_task.await.unwrap()?;
    Ok(received)
}

#[tokio::test]
async fn roundtrip_preserves_bytes() {
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let received = roundtrip(&data, 512, 4).await.unwrap();
    assert_eq!(received, data);
}

#[tokio::test]
async fn roundtrip_empty_source() {
    let received = roundtrip(b"", 512, 4).await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn roundtrip_single_short_chunk() {
    let received = roundtrip(b"hi", 512, 2).await.unwrap();
    assert_eq!(&received, b"hi");
}

/// 10 bytes, chunk size 4, concurrency 1: chunks are 4+4+2 bytes at
/// numbers 1..=3 with the terminator at 4, and the receiver reproduces
/// the original bytes.
#[tokio::test]
async fn ten_bytes_chunk_four_concurrency_one() {
    let data = b"0123456789";
    let relay = Arc::new(MemoryRelay::new());
    let config = TransferConfig::new("scenario")
        .with_chunk_size(4)
        .with_concurrency(1);

    let sender = Sender::new(Arc::clone(&relay), config.clone());
    sender.send(byte_source(split(data, 4))).await.unwrap();

    // Exactly chunks 1..=3 plus the terminator at 4 were posted.
    assert_eq!(relay.pending(), 4);

    let receiver = Receiver::new(Arc::clone(&relay), config);
    let mut stream = receiver.stream();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.recv().await {
        chunks.push(chunk.unwrap());
    }

    let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    assert_eq!(&joined, data);
}

/// The terminator lands exactly one past the last real chunk and is the
/// only empty chunk of the transfer.
#[tokio::test]
async fn terminator_position_and_uniqueness() {
    let relay = Arc::new(MemoryRelay::new());
    let config = TransferConfig::new("term").with_chunk_size(4);
    let sender = Sender::new(Arc::clone(&relay), config);
    sender.send(byte_source(split(b"0123456789", 4))).await.unwrap();

    for n in 1..=3u64 {
        let body = relay.fetch_chunk(&chunk_address("term", n)).await.unwrap();
        assert!(!body.is_empty(), "chunk {n} must carry payload");
    }
    let terminator = relay.fetch_chunk(&chunk_address("term", 4)).await.unwrap();
    assert!(terminator.is_empty());
    assert_eq!(relay.pending(), 0);
}

/// Receiver pulls while the sender is still posting, at higher
/// concurrency than the sender.
#[tokio::test]
async fn concurrent_send_and_receive() {
    let data: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let relay = Arc::new(MemoryRelay::new());
    let send_config = TransferConfig::new("pipelined")
        .with_chunk_size(1024)
        .with_concurrency(2);
    let recv_config = send_config.clone().with_concurrency(6);

    let sender = Sender::new(Arc::clone(&relay), send_config);
    let receiver = Receiver::new(Arc::clone(&relay), recv_config);

    let source = byte_source(split(&data, 1024));
    let send_task = tokio::spawn(async move { sender.send(source).await });

    let mut stream = receiver.stream();
    let mut received = Vec::new();
    while let Some(chunk) = stream.recv().await {
        received.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(send_task.await.unwrap().unwrap(), data.len() as u64);
    assert_eq!(received, data);
}

/// File on disk -> chunker -> progress -> sender -> relay -> receiver.
#[tokio::test]
async fn file_roundtrip_with_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.bin");
    let data: Vec<u8> = (0..9_999u32).map(|i| (i % 209) as u8).collect();
    std::fs::write(&path, &data).unwrap();

    let relay = Arc::new(MemoryRelay::new());
    let config = TransferConfig::new("file-rt")
        .with_chunk_size(1000)
        .with_concurrency(3);

    let totals = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&totals);
    let chunker = FileChunker::open(&path, config.chunk_size).await.unwrap();
    let source = ProgressStream::new(
        chunker.into_stream(),
        Box::new(move |n| recorded.lock().unwrap().push(n)),
    );

    let sender = Sender::new(Arc::clone(&relay), config.clone());
    let receiver = Receiver::new(Arc::clone(&relay), config);

    let send_task = tokio::spawn(async move { sender.send(source).await });

    let mut received = Vec::new();
    let mut stream = receiver.stream();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }

    send_task.await.unwrap().unwrap();
    assert_eq!(received, data);

    let totals = totals.lock().unwrap();
    assert!(totals.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*totals.last().unwrap(), data.len() as u64);
}
