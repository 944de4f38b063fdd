//! Chunked relay transfer engine.
//!
//! Moves a byte stream of unknown length through an HTTP relay as numbered,
//! hash-addressed chunks. The sender splits the stream and POSTs each chunk
//! to its address under a bounded concurrency budget, then POSTs an empty
//! terminator chunk. The receiver GETs successive addresses with the same
//! budget and reassembles the chunks in order even though individual fetches
//! complete out of order.
//!
//! # Wire protocol
//!
//! For a transfer identified by `path_prefix`:
//! - `POST address(path_prefix, n)` with chunk *n*'s bytes, `n = 1..=K`,
//!   then `n = K + 1` with an empty body (`Content-Length: 0`) to terminate.
//! - `GET address(path_prefix, n)` for `n = 1, 2, …`; an empty response body
//!   ends the logical stream.
//!
//! A zero-length body is reserved for the terminator, so the payload stream
//! must never produce an empty chunk; [`Sender::send`] rejects one rather
//! than cutting the transfer short on the receiving side.

mod chunker;
mod limiter;
mod progress;
mod receiver;
mod sender;
mod serial;
mod transport;

pub use chunker::FileChunker;
pub use limiter::ConcurrencyLimiter;
pub use progress::{ProgressCallback, ProgressStream};
pub use receiver::{ChunkStream, Receiver};
pub use sender::Sender;
pub use serial::SerialExecutor;
pub use transport::{ChunkTransport, HttpTransport, MemoryRelay};

/// Default chunk size: 1 MiB.
///
/// Each chunk is held in memory in full on both sides, so the chunk size
/// bounds per-transfer memory at roughly `chunk_size * concurrency`.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default number of in-flight requests per transfer.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transfer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Per-transfer configuration, supplied by the caller.
///
/// Nothing here is read from the environment; a transfer session owns its
/// configuration and is discarded when the stream completes or fails.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Opaque transfer identifier; hashed together with each chunk number
    /// to form chunk addresses.
    pub path_prefix: String,
    /// Chunk size in bytes for local sources (sender side).
    pub chunk_size: usize,
    /// Concurrency budget: maximum in-flight requests.
    pub concurrency: usize,
}

impl TransferConfig {
    /// Creates a configuration with default chunk size and concurrency.
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the chunk size (0 falls back to [`DEFAULT_CHUNK_SIZE`]).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    /// Sets the concurrency budget (clamped to at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}
