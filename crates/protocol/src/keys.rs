use sha2::{Digest, Sha256};

/// Derived key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// Hash rounds applied when stretching a passphrase.
const KEY_ROUNDS: u32 = 100_000;

/// Derives a 256-bit key from a passphrase by iterated SHA-256.
///
/// Deterministic: the same passphrase always yields the same key, so two
/// parties sharing a passphrase can derive the same transfer identity
/// without exchanging it. The key never crosses the wire.
pub fn derive_key(passphrase: &str) -> [u8; KEY_LENGTH] {
    let mut digest: [u8; KEY_LENGTH] = Sha256::digest(passphrase.as_bytes()).into();
    for _ in 1..KEY_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(passphrase.as_bytes());
        digest = hasher.finalize().into();
    }
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_deterministic() {
        assert_eq!(derive_key("open sesame"), derive_key("open sesame"));
    }

    #[test]
    fn derive_key_distinct_passphrases() {
        assert_ne!(derive_key("open sesame"), derive_key("open sesame!"));
    }

    #[test]
    fn derived_key_differs_from_plain_digest() {
        let plain: [u8; KEY_LENGTH] = Sha256::digest(b"open sesame").into();
        assert_ne!(derive_key("open sesame"), plain);
    }
}
