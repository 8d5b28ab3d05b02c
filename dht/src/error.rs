use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("dht key absent")]
    NotFound,

    #[error("value exceeds chunking boundary but no chunk metadata found")]
    MissingChunk { index: u32 },

    #[error("chunk metadata malformed")]
    BadMetadata,

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("serialization error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("chunk metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DhtError>;
