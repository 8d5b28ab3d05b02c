//! SHA3-512 hashing, following the thin-wrapper style of `lib-crypto/src/hashing/sha3.rs`.

use sha3::{Digest, Sha3_512};

/// SHA3-512 of `data`, 64 bytes.
pub fn sha3_512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha3_512::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hex-encoded SHA3-512, used for fingerprints (128 hex chars).
pub fn sha3_512_hex(data: &[u8]) -> String {
    hex::encode(sha3_512(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_64_bytes() {
        assert_eq!(sha3_512(b"hello").len(), 64);
    }

    #[test]
    fn hex_is_128_chars() {
        assert_eq!(sha3_512_hex(b"hello").len(), 128);
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha3_512(b"a"), sha3_512(b"a"));
        assert_ne!(sha3_512(b"a"), sha3_512(b"b"));
    }
}
