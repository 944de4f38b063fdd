use sha2::{Digest, Sha256};

/// Length of a chunk address in hex characters (SHA-256 = 64).
pub const ADDRESS_LENGTH: usize = 64;

/// Formats the chunk key for `chunk_number` within a transfer.
///
/// The key is only ever used as hash input; it never appears on the wire.
pub fn chunk_key(path_prefix: &str, chunk_number: u64) -> String {
    format!("{path_prefix}/{chunk_number}")
}

/// Computes the opaque network address of a chunk.
///
/// The address is the lowercase hex SHA-256 digest of the chunk key, used
/// directly as the last path segment of the relay URL. Deterministic:
/// identical `(path_prefix, chunk_number)` pairs always map to the same
/// address, and an observer without the prefix cannot recover chunk
/// ordering from the address space.
pub fn chunk_address(path_prefix: &str, chunk_number: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk_key(path_prefix, chunk_number).as_bytes());
    hex::encode(hasher.finalize())
}

/// Joins a base URL and a path segment without duplicating separators.
pub fn join_url(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}
