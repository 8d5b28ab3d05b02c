//! Typed crypto failures.
//!
//! Every primitive in this crate returns one of these variants rather than
//! a bare `anyhow!` string — callers branch on failure kind (spec calls for
//! no silent truncation and no generic catch-all).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed ciphertext")]
    BadCiphertext,

    #[error("signature verification failed")]
    BadSignature,

    #[error("AEAD tag mismatch")]
    BadTag,

    #[error("input of unexpected length: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("key unwrap failed integrity check")]
    BadKeyWrap,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
