//! Three-tier transport (spec.md §4.5): direct TCP, NAT-traversed ICE, and a
//! durable DHT-backed offline queue as the fallback of last resort.

pub mod cache;
pub mod error;
pub mod framing;
pub mod ice;
pub mod sender;
pub mod tcp;

pub use cache::{ConnHandle, ConnKind, ConnectionCache};
pub use error::{Result, TransportError};
pub use framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_BYTES};
pub use ice::{candidate_key, IcePeerConnection, IceTier};
pub use sender::Sender;
pub use tcp::{listen_addr_key, TcpTier, DEFAULT_ACK_TIMEOUT};
