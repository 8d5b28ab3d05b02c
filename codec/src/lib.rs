//! Message envelope codec: direct and group-GSK encoding/decoding for the
//! offline-queue and live-transport message formats (spec.md §3, §4.7).

pub mod decoder;
pub mod encoder;
pub mod envelope;
pub mod error;

pub use decoder::{decode, within_replay_window, Decoded, GskLookup};
pub use encoder::{encode_direct, encode_group};
pub use envelope::{envelope_addressed_to, group_envelope_target, Header};
pub use error::{CodecError, Result};
