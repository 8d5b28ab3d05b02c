//! CRYSTALS-Kyber1024 wrapper — Category-5 KEM.

use crate::error::{CryptoError, Result};
use pqcrypto_kyber::kyber1024;
use pqcrypto_traits::kem::{Ciphertext, PublicKey as KemPublicKey, SecretKey as KemSecretKey, SharedSecret};
use zeroize::Zeroizing;

/// Public key is ~1,568 bytes, secret key ~3,168 bytes.
pub fn kem_keygen() -> (Vec<u8>, Zeroizing<Vec<u8>>) {
    let (pk, sk) = kyber1024::keypair();
    (pk.as_bytes().to_vec(), Zeroizing::new(sk.as_bytes().to_vec()))
}

/// Encapsulate against `pk`, returning `(ciphertext, shared_secret)`.
pub fn kem_encap(pk: &[u8]) -> Result<(Vec<u8>, Zeroizing<[u8; 32]>)> {
    let pk = kyber1024::PublicKey::from_bytes(pk).map_err(|_| CryptoError::BadLength {
        expected: kyber1024::public_key_bytes(),
        actual: pk.len(),
    })?;
    let (shared_secret, ciphertext) = kyber1024::encapsulate(&pk);
    let mut secret = [0u8; 32];
    secret.copy_from_slice(shared_secret.as_bytes());
    Ok((ciphertext.as_bytes().to_vec(), Zeroizing::new(secret)))
}

/// Decapsulate `ct` with `sk`. Fails with `BadCiphertext` on malformed input.
pub fn kem_decap(ct: &[u8], sk: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let sk = kyber1024::SecretKey::from_bytes(sk).map_err(|_| CryptoError::BadLength {
        expected: kyber1024::secret_key_bytes(),
        actual: sk.len(),
    })?;
    let ct = kyber1024::Ciphertext::from_bytes(ct).map_err(|_| CryptoError::BadCiphertext)?;
    let shared_secret = kyber1024::decapsulate(&ct, &sk);
    let mut secret = [0u8; 32];
    secret.copy_from_slice(shared_secret.as_bytes());
    Ok(Zeroizing::new(secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encap_decap_agree() {
        let (pk, sk) = kem_keygen();
        let (ct, secret1) = kem_encap(&pk).unwrap();
        let secret2 = kem_decap(&ct, &sk).unwrap();
        assert_eq!(*secret1, *secret2);
    }

    #[test]
    fn malformed_ciphertext_rejected() {
        let (_pk, sk) = kem_keygen();
        let bad_ct = vec![0u8; 4];
        assert!(matches!(kem_decap(&bad_ct, &sk), Err(CryptoError::BadCiphertext)));
    }

    #[test]
    fn bad_public_key_length_rejected() {
        let result = kem_encap(&[1, 2, 3]);
        assert!(matches!(result, Err(CryptoError::BadLength { .. })));
    }
}
