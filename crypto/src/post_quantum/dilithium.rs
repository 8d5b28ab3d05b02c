//! CRYSTALS-Dilithium5 wrapper — Category-5 signatures.
//!
//! Uses detached signatures: the wire formats in this system carry the
//! signature as its own length-prefixed trailer, never folded together
//! with the signed bytes the way `pqcrypto`'s combined `sign`/`open` does.

use crate::error::{CryptoError, Result};
use pqcrypto_dilithium::dilithium5;
use pqcrypto_traits::sign::{
    DetachedSignature, PublicKey as SignPublicKey, SecretKey as SignSecretKey,
};
use zeroize::Zeroizing;

/// Public key is ~2,592 bytes, secret key ~4,864 bytes.
pub fn sig_keygen() -> (Vec<u8>, Zeroizing<Vec<u8>>) {
    let (pk, sk) = dilithium5::keypair();
    (pk.as_bytes().to_vec(), Zeroizing::new(sk.as_bytes().to_vec()))
}

/// Sign `msg`, producing a detached signature (4,595 bytes).
pub fn sig_sign(sk: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let sk = dilithium5::SecretKey::from_bytes(sk).map_err(|_| CryptoError::BadLength {
        expected: dilithium5::secret_key_bytes(),
        actual: sk.len(),
    })?;
    Ok(dilithium5::detached_sign(msg, &sk).as_bytes().to_vec())
}

/// Verify `sig` over `msg` under `pk`. Never panics on malformed input.
pub fn sig_verify(pk: &[u8], msg: &[u8], sig: &[u8]) -> Result<bool> {
    let pk = dilithium5::PublicKey::from_bytes(pk).map_err(|_| CryptoError::BadLength {
        expected: dilithium5::public_key_bytes(),
        actual: pk.len(),
    })?;
    let sig = match dilithium5::DetachedSignature::from_bytes(sig) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    Ok(dilithium5::verify_detached_signature(&sig, msg, &pk).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let (pk, sk) = sig_keygen();
        let msg = b"dna-messenger ikp header";
        let sig = sig_sign(&sk, msg).unwrap();
        assert!(sig_verify(&pk, msg, &sig).unwrap());
    }

    #[test]
    fn tampered_message_fails() {
        let (pk, sk) = sig_keygen();
        let sig = sig_sign(&sk, b"hello").unwrap();
        assert!(!sig_verify(&pk, b"hellp", &sig).unwrap());
    }

    #[test]
    fn bad_signature_returns_error_not_panic() {
        let (pk, _sk) = sig_keygen();
        assert_eq!(sig_verify(&pk, b"hi", &[0u8; 3]).unwrap(), false);
    }
}
