//! The orchestrator's own error taxonomy (spec.md §7 `DnaError`), plus the
//! `#[from]` bridges needed to fold every crate's error type into one enum
//! at the point this binary calls into them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnaError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Crypto(#[from] dna_crypto::error::CryptoError),
    #[error("packet is not addressed to this identity")]
    NotForMe,
    #[error("value is stale")]
    Stale,
    #[error("value has expired")]
    Expired,
    #[error("network error: {0}")]
    Network(String),
    #[error("capacity exceeded")]
    Capacity,
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Codec(#[from] dna_codec::CodecError),
    #[error(transparent)]
    Gsk(#[from] dna_gsk::GskError),
    #[error(transparent)]
    Queue(#[from] dna_queue::QueueError),
    #[error(transparent)]
    Identity(#[from] dna_identity::IdentityError),
    #[error(transparent)]
    Transport(#[from] dna_transport::TransportError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("embedded storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Dht(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DnaError>;
