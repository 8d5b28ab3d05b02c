use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed envelope: {0}")]
    Protocol(String),
    #[error("envelope not addressed to this identity")]
    NotForMe,
    #[error("{count} recipients exceeds the envelope wire format's 255-recipient-count limit")]
    Capacity { count: usize },
    #[error("no GSK cached locally for this group/version")]
    NotFound,
    #[error("sender fingerprint inside plaintext does not match the signer")]
    Unauthorized,
    #[error("crypto error: {0}")]
    Crypto(#[from] dna_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, CodecError>;
