//! Keypair types bundling a signing identity and an encryption identity.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::post_quantum::{dilithium, kyber};
use crate::traits::ZeroizingKey;

/// A Dilithium5 signing keypair.
#[derive(Clone)]
pub struct SigningKeyPair {
    pub public: Vec<u8>,
    pub secret: SigningSecretKey,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecretKey(pub Vec<u8>);

impl ZeroizingKey for SigningSecretKey {}

impl SigningKeyPair {
    pub fn generate() -> Self {
        let (public, secret) = dilithium::sig_keygen();
        Self { public, secret: SigningSecretKey(secret.to_vec()) }
    }

    pub fn sign(&self, msg: &[u8]) -> crate::error::Result<Vec<u8>> {
        dilithium::sig_sign(&self.secret.0, msg)
    }
}

/// A Kyber1024 encryption (KEM) keypair.
#[derive(Clone)]
pub struct KemKeyPair {
    pub public: Vec<u8>,
    pub secret: KemSecretKey,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KemSecretKey(pub Vec<u8>);

impl ZeroizingKey for KemSecretKey {}

impl KemKeyPair {
    pub fn generate() -> Self {
        let (public, secret) = kyber::kem_keygen();
        Self { public, secret: KemSecretKey(secret.to_vec()) }
    }

    pub fn decap(&self, ciphertext: &[u8]) -> crate::error::Result<[u8; 32]> {
        Ok(*kyber::kem_decap(ciphertext, &self.secret.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_keypair_roundtrips() {
        let kp = SigningKeyPair::generate();
        let sig = kp.sign(b"msg").unwrap();
        assert!(crate::post_quantum::dilithium::sig_verify(&kp.public, b"msg", &sig).unwrap());
    }

    #[test]
    fn kem_keypair_decaps_own_encap() {
        let kp = KemKeyPair::generate();
        let (ct, secret) = kyber::kem_encap(&kp.public).unwrap();
        let decapped = kp.decap(&ct).unwrap();
        assert_eq!(*secret, decapped);
    }
}
