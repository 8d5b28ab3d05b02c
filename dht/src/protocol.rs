//! Wire messages exchanged between DHT peers.
//!
//! Grounded on `lib-storage/src/dht/messaging.rs`'s message_id + pending
//! response map + timeout pattern, trimmed from the teacher's retry queue to
//! the single request/response round trip spec.md's DHT contract needs.

use serde::{Deserialize, Serialize};

use crate::types::{DhtKey, ValueType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DhtMessage {
    Put {
        request_id: u64,
        key: DhtKey,
        data: Vec<u8>,
        value_type: ValueType,
        value_id: Option<u64>,
        seq: u32,
    },
    Get {
        request_id: u64,
        key: DhtKey,
        all: bool,
    },
    PutAck {
        request_id: u64,
    },
    GetResponse {
        request_id: u64,
        values: Vec<Vec<u8>>,
    },
}

impl DhtMessage {
    pub fn request_id(&self) -> u64 {
        match self {
            DhtMessage::Put { request_id, .. }
            | DhtMessage::Get { request_id, .. }
            | DhtMessage::PutAck { request_id }
            | DhtMessage::GetResponse { request_id, .. } => *request_id,
        }
    }
}
