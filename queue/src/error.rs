use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("outbox blob malformed: {0}")]
    Malformed(String),
    #[error("appending this envelope would exceed the 50 KB outbox slot ({size} bytes)")]
    Capacity { size: usize },
}

pub type Result<T> = std::result::Result<T, QueueError>;
