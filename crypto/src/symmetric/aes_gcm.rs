//! AES-256-GCM AEAD seal/open.
//!
//! Unlike the teacher's ChaCha20-Poly1305 wrapper (which generates and
//! prepends its own nonce), the caller supplies the nonce here: the wire
//! formats in this system lay the 12-byte nonce out as its own field
//! alongside the ciphertext+tag, not folded into one blob.

use crate::error::{CryptoError, Result};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Seal `plaintext` under `key` (32 bytes) and `nonce` (12 bytes), binding `aad`.
/// Returns `ciphertext || tag`.
pub fn aes_gcm_seal(key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(CryptoError::BadLength { expected: 32, actual: key.len() });
    }
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::BadLength { expected: NONCE_LEN, actual: nonce.len() });
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::BadTag)
}

/// Open `ciphertext_and_tag` under `key`/`nonce`/`aad`. Fails with `BadTag`
/// on any mismatch — never truncates or returns partial plaintext.
pub fn aes_gcm_open(key: &[u8], nonce: &[u8], aad: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(CryptoError::BadLength { expected: 32, actual: key.len() });
    }
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::BadLength { expected: NONCE_LEN, actual: nonce.len() });
    }
    if ciphertext_and_tag.len() < TAG_LEN {
        return Err(CryptoError::BadTag);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext_and_tag, aad })
        .map_err(|_| CryptoError::BadTag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::random_bytes;

    #[test]
    fn seal_open_roundtrip() {
        let key = random_bytes(32);
        let nonce = random_bytes(NONCE_LEN);
        let aad = b"dna-messenger-v1";
        let pt = b"hi";
        let sealed = aes_gcm_seal(&key, &nonce, aad, pt).unwrap();
        let opened = aes_gcm_open(&key, &nonce, aad, &sealed).unwrap();
        assert_eq!(opened, pt);
    }

    #[test]
    fn bit_flipped_tag_rejected() {
        let key = random_bytes(32);
        let nonce = random_bytes(NONCE_LEN);
        let mut sealed = aes_gcm_seal(&key, &nonce, b"", b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(aes_gcm_open(&key, &nonce, b"", &sealed), Err(CryptoError::BadTag)));
    }

    #[test]
    fn bit_flipped_ciphertext_rejected() {
        let key = random_bytes(32);
        let nonce = random_bytes(NONCE_LEN);
        let mut sealed = aes_gcm_seal(&key, &nonce, b"", b"payload").unwrap();
        sealed[0] ^= 0x01;
        assert!(matches!(aes_gcm_open(&key, &nonce, b"", &sealed), Err(CryptoError::BadTag)));
    }
}
