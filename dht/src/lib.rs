//! Signed-value DHT client.
//!
//! Provides the put/put_signed/get/get_all/get_async/chunked_store/
//! chunked_fetch contract the rest of the system treats the DHT as. Keys are
//! always 64-byte SHA3-512 hashes; values carry a TTL class and optional
//! `(value_id, seq)` replacement identity.

pub mod client;
pub mod error;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod types;

pub use client::DhtClient;
pub use error::{DhtError, Result};
pub use store::ValueStore;
pub use transport::{DhtTransport, UdpDhtTransport};
pub use types::{ChunkMetadata, DhtKey, DhtValue, ValueType};
