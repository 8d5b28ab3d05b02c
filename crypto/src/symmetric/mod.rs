//! Symmetric primitives: AES-256-GCM AEAD and AES key wrap (RFC 3394).

pub mod aes_gcm;
pub mod keywrap;

pub use aes_gcm::{aes_gcm_seal, aes_gcm_open};
pub use keywrap::{aes_keywrap, aes_keyunwrap};
