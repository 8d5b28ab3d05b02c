//! Per-recipient offline message outbox (spec.md §4.4): durable DHT-backed
//! mailboxes with append, parallel retrieve, and clear.

pub mod error;
pub mod outbox;
pub mod retrieve;

pub use error::{QueueError, Result};
pub use outbox::{frame_entries, outbox_key, parse_entries, OutboxWriter, OUTBOX_CAPACITY_BYTES};
pub use retrieve::{retrieve_parallel, DEFAULT_RETRIEVE_TIMEOUT};
