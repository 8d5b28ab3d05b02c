//! Post-quantum crypto primitives facade.
//!
//! Wraps CRYSTALS-Kyber1024 (KEM), CRYSTALS-Dilithium5 (signatures),
//! AES-256-GCM, AES key wrap, and SHA3-512 behind typed, constant-time-safe
//! functions. Every failure is a [`CryptoError`] variant — no silent
//! truncation, no panics on attacker-controlled input.

pub mod error;
pub mod hashing;
pub mod keys;
pub mod post_quantum;
pub mod random;
pub mod symmetric;
pub mod traits;

pub use error::{CryptoError, Result};
pub use hashing::{sha3_512, sha3_512_hex};
pub use keys::{KemKeyPair, SigningKeyPair};
pub use post_quantum::{kem_decap, kem_encap, kem_keygen, sig_sign, sig_verify, sig_keygen};
pub use random::{random_bytes, random_key32, random_nonce};
pub use symmetric::{aes_gcm_open, aes_gcm_seal, aes_keyunwrap, aes_keywrap};

/// Expected sizes for the Category-5 primitives this facade wraps, used by
/// callers sizing buffers (e.g. the IKP layout in `dna-gsk`).
pub mod sizes {
    pub const KEM_PUBLIC_KEY: usize = 1568;
    pub const KEM_CIPHERTEXT: usize = 1568;
    pub const SIG_PUBLIC_KEY: usize = 2592;
    pub const SIGNATURE: usize = 4595;
    pub const WRAPPED_KEY: usize = 40;
    pub const FINGERPRINT_BYTES: usize = 64;
}
