use thiserror::Error;

#[derive(Debug, Error)]
pub enum GskError {
    #[error("IKP buffer too short for header")]
    BadHeader,
    #[error("IKP declares member_count == 0")]
    EmptyMembership,
    #[error("group has {actual} members, exceeding the IKP wire format's 255-member-count limit")]
    TooManyMembers { actual: usize },
    #[error("IKP declared size does not match buffer size (expected {expected}, got {actual})")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("IKP signature does not verify against the owner's signing key")]
    BadSignature,
    #[error("own fingerprint not present in IKP member list")]
    NotAMember,
    #[error("no active or cached GSK for this group/version")]
    NotFound,
    #[error("crypto error: {0}")]
    Crypto(#[from] dna_crypto::CryptoError),
    #[error("dht error: {0}")]
    Dht(#[from] dna_dht::DhtError),
    #[error("identity error: {0}")]
    Identity(#[from] dna_identity::IdentityError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GskError>;
