//! Addressing and key derivation for the chunkpipe relay protocol.
//!
//! A transfer is identified by an opaque path prefix; each chunk of the
//! transfer lives at the SHA-256 address of `{prefix}/{number}`. Only these
//! pure helpers live here; the transfer engine itself is in
//! `chunkpipe-transfer`.

mod address;
mod keys;

pub use address::{ADDRESS_LENGTH, chunk_address, chunk_key, join_url};
pub use keys::{KEY_LENGTH, derive_key};
