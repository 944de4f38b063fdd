//! Transport seam between the transfer engine and the relay.
//!
//! The engine only ever issues two operations against a chunk address:
//! post a body, fetch a body. Everything else about the relay (connection
//! handling, TLS, transport-level retries) belongs to the HTTP client.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;

use chunkpipe_protocol::join_url;

use crate::TransferError;

/// One chunk-sized request/response exchange with the relay.
///
/// An empty body is the transfer terminator on the wire; implementations
/// carry it through unchanged in both directions.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Posts `body` to `address` and waits until the acknowledgment
    /// response has been fully drained.
    async fn post_chunk(&self, address: &str, body: Bytes) -> Result<(), TransferError>;

    /// Fetches the body stored at `address`, fully drained into one
    /// contiguous buffer.
    async fn fetch_chunk(&self, address: &str) -> Result<Bytes, TransferError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Production transport: plain HTTP requests against a relay server.
///
/// The chunk address becomes the last path segment under `server_url`.
pub struct HttpTransport {
    client: reqwest::Client,
    server_url: String,
}

impl HttpTransport {
    /// Creates a transport for the relay at `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.into(),
        }
    }

    /// Creates a transport reusing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl ChunkTransport for HttpTransport {
    async fn post_chunk(&self, address: &str, body: Bytes) -> Result<(), TransferError> {
        let url = join_url(&self.server_url, address);
        let mut request = self.client.post(&url);
        if body.is_empty() {
            // The terminator must advertise its emptiness explicitly.
            request = request.header(reqwest::header::CONTENT_LENGTH, "0");
        }
        let response = request.body(body).send().await?.error_for_status()?;
        // Wait for the acknowledgment body to complete before releasing
        // the slot this request occupies.
        response.bytes().await?;
        Ok(())
    }

    async fn fetch_chunk(&self, address: &str) -> Result<Bytes, TransferError> {
        let url = join_url(&self.server_url, address);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

// ---------------------------------------------------------------------------
// MemoryRelay
// ---------------------------------------------------------------------------

enum Slot {
    /// Body posted, nobody has fetched it yet.
    Posted(Bytes),
    /// A fetch arrived first and is parked until the post shows up.
    Claimed(oneshot::Sender<Bytes>),
}

/// In-process relay with rendezvous semantics.
///
/// Mirrors the wire behavior the engine relies on: a fetch for an address
/// blocks until the matching post arrives, each address is consumed by
/// exactly one fetch, and a second post to the same address is rejected.
/// Used for loopback transfers and throughout the test suite.
#[derive(Default)]
pub struct MemoryRelay {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of posted-but-unfetched bodies, for test assertions.
    pub fn pending(&self) -> usize {
        let slots = self.slots.lock().unwrap();
        slots
            .values()
            .filter(|slot| matches!(slot, Slot::Posted(_)))
            .count()
    }
}

#[async_trait]
impl ChunkTransport for MemoryRelay {
    async fn post_chunk(&self, address: &str, body: Bytes) -> Result<(), TransferError> {
        let mut slots = self.slots.lock().unwrap();
        match slots.remove(address) {
            Some(Slot::Claimed(waiter)) => {
                let _ = waiter.send(body);
                Ok(())
            }
            Some(Slot::Posted(existing)) => {
                slots.insert(address.to_string(), Slot::Posted(existing));
                Err(TransferError::Protocol(format!(
                    "duplicate post for address {address}"
                )))
            }
            None => {
                slots.insert(address.to_string(), Slot::Posted(body));
                Ok(())
            }
        }
    }

    async fn fetch_chunk(&self, address: &str) -> Result<Bytes, TransferError> {
        let waiter = {
            let mut slots = self.slots.lock().unwrap();
            match slots.remove(address) {
                Some(Slot::Posted(body)) => return Ok(body),
                Some(Slot::Claimed(_)) => {
                    return Err(TransferError::Protocol(format!(
                        "concurrent fetches for address {address}"
                    )));
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    slots.insert(address.to_string(), Slot::Claimed(tx));
                    rx
                }
            }
        };
        waiter
            .await
            .map_err(|_| TransferError::Protocol("relay dropped while waiting".into()))
    }
}
