use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity record not found for fingerprint")]
    NotFound,
    #[error("malformed identity record: {0}")]
    Malformed(String),
    #[error("dht error: {0}")]
    Dht(#[from] dna_dht::DhtError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
