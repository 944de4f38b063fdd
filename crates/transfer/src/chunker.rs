//! Fixed-size chunking of a local file.

use std::path::Path;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::io::AsyncReadExt;

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Lazily slices a local file into fixed-size chunks.
///
/// Covers `[0, size)` with the final chunk possibly shorter, then signals
/// end-of-data. Reads happen one at a time, on demand; never yields an
/// empty chunk.
pub struct FileChunker {
    file: tokio::fs::File,
    chunk_size: usize,
    size: u64,
    offset: u64,
}

impl FileChunker {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            chunk_size,
            size,
            offset: 0,
        })
    }

    /// Reads the next chunk. Returns `None` at end-of-data.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransferError> {
        let remaining = self.size.saturating_sub(self.offset);
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; read_size];
        let n = self.file.read(&mut buf).await?;
        if n == 0 {
            // File shrank underneath us; treat as end-of-data.
            return Ok(None);
        }
        buf.truncate(n);
        self.offset += n as u64;
        Ok(Some(Bytes::from(buf)))
    }

    /// Total file size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.offset)
    }

    /// Converts the chunker into a pull-driven chunk stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, TransferError>> {
        futures_util::stream::try_unfold(self, |mut chunker| async move {
            Ok(chunker.next_chunk().await?.map(|chunk| (chunk, chunker)))
        })
        .boxed()
    }
}
