use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame of {len} bytes exceeds max_frame_bytes ({max})")]
    FrameTooLarge { len: u32, max: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer unreachable on this tier")]
    Unreachable,
    #[error("operation timed out")]
    Timeout,
    #[error("ice agent not ready")]
    IceNotReady,
    #[error("ice connectivity check failed: {0}")]
    Ice(String),
    #[error("peer acknowledged with an unexpected frame")]
    BadAck,
    #[error("codec error: {0}")]
    Codec(#[from] dna_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, TransportError>;
