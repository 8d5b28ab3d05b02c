//! DHT value model: 64-byte keys, typed TTLs, `(value_id, seq)` replacement.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A DHT key is always a 64-byte SHA3-512 hash.
pub type DhtKey = [u8; 64];

pub const SEVEN_DAYS_SECS: u64 = 7 * 24 * 60 * 60;
pub const YEAR_SECS: u64 = 365 * 24 * 60 * 60;

/// How long a value is retained before natural expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    SevenDay,
    Year,
    Permanent,
}

impl ValueType {
    pub fn ttl_secs(&self) -> Option<u64> {
        match self {
            ValueType::SevenDay => Some(SEVEN_DAYS_SECS),
            ValueType::Year => Some(YEAR_SECS),
            ValueType::Permanent => None,
        }
    }
}

/// A single stored value. Unsigned values have `value_id = None` and always
/// coexist (never replaced, never deleted by us); signed values carry a
/// `value_id` and a monotonic `seq` used for replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhtValue {
    pub data: Vec<u8>,
    pub value_type: ValueType,
    pub value_id: Option<u64>,
    pub seq: u32,
    pub stored_at: u64,
    pub signed: bool,
}

impl DhtValue {
    pub fn is_expired(&self, now: u64) -> bool {
        match self.value_type.ttl_secs() {
            Some(ttl) => now.saturating_sub(self.stored_at) > ttl,
            None => false,
        }
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Chunk metadata published alongside a large value's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunks: u32,
    pub total_size: u64,
}
