//! Offline message envelope binary layout (spec.md §3): a fixed 20-byte
//! header, a message-type-specific table, an AES-256-GCM block, and a
//! trailing post-quantum signature over everything before it.

use crate::error::{CodecError, Result};

pub const MAGIC: &[u8; 8] = b"PQSIGENC";
pub const ENVELOPE_VERSION: u8 = 1;

pub const ENC_KEY_TYPE_KYBER1024: u8 = 1;
pub const ENC_KEY_TYPE_GSK: u8 = 0;

pub const MESSAGE_TYPE_DIRECT: u8 = 0x00;
pub const MESSAGE_TYPE_GROUP: u8 = 0x01;

pub const HEADER_LEN: usize = 8 + 1 + 1 + 1 + 1 + 4 + 4;
pub const RECIPIENT_ENTRY_LEN: usize = 64 + dna_crypto::sizes::KEM_CIPHERTEXT + dna_crypto::sizes::WRAPPED_KEY;
pub const GROUP_TABLE_LEN: usize = 16 + 4;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const SENDER_PAYLOAD_PREFIX_LEN: usize = 64 + 8;

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub enc_key_type: u8,
    pub recipient_count: u8,
    pub message_type: u8,
    pub encrypted_size: u32,
    pub signature_size: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..8].copy_from_slice(MAGIC);
        out[8] = ENVELOPE_VERSION;
        out[9] = self.enc_key_type;
        out[10] = self.recipient_count;
        out[11] = self.message_type;
        out[12..16].copy_from_slice(&self.encrypted_size.to_be_bytes());
        out[16..20].copy_from_slice(&self.signature_size.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Header> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Protocol("buffer shorter than envelope header".into()));
        }
        if &bytes[0..8] != MAGIC {
            return Err(CodecError::Protocol("bad magic".into()));
        }
        if bytes[8] != ENVELOPE_VERSION {
            return Err(CodecError::Protocol(format!("unsupported envelope version {}", bytes[8])));
        }
        Ok(Header {
            enc_key_type: bytes[9],
            recipient_count: bytes[10],
            message_type: bytes[11],
            encrypted_size: u32::from_be_bytes(bytes[12..16].try_into().unwrap()),
            signature_size: u32::from_be_bytes(bytes[16..20].try_into().unwrap()),
        })
    }
}

/// Scan a direct envelope's recipient table for `fingerprint` without any
/// key material — used by the offline queue to filter a shared outbox blob
/// down to the entries actually worth decrypting.  Group envelopes carry no
/// per-recipient table and are never addressed this way.
pub fn envelope_addressed_to(bytes: &[u8], fingerprint: &[u8; 64]) -> bool {
    use subtle::ConstantTimeEq;

    let Ok(header) = Header::decode(bytes) else { return false };
    if header.message_type != MESSAGE_TYPE_DIRECT {
        return false;
    }
    let table_start = HEADER_LEN;
    for i in 0..header.recipient_count as usize {
        let start = table_start + i * RECIPIENT_ENTRY_LEN;
        let end = start + 64;
        if end > bytes.len() {
            return false;
        }
        if bool::from(bytes[start..end].ct_eq(&fingerprint[..])) {
            return true;
        }
    }
    false
}

/// Peek a group envelope's `(group_uuid, gsk_version)` without verifying its
/// signature or touching the GCM block — used by the orchestration layer to
/// know which GSK to fetch on a decode miss, before it's known whether the
/// envelope is even authentic.
pub fn group_envelope_target(bytes: &[u8]) -> Option<(uuid::Uuid, u32)> {
    let header = Header::decode(bytes).ok()?;
    if header.message_type != MESSAGE_TYPE_GROUP {
        return None;
    }
    let table_start = HEADER_LEN;
    let table_end = table_start.checked_add(GROUP_TABLE_LEN)?;
    if table_end > bytes.len() {
        return None;
    }
    let table = &bytes[table_start..table_end];
    let group_uuid = uuid::Uuid::from_slice(&table[0..16]).ok()?;
    let gsk_version = u32::from_be_bytes(table[16..20].try_into().ok()?);
    Some((group_uuid, gsk_version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips() {
        let header = Header { enc_key_type: ENC_KEY_TYPE_KYBER1024, recipient_count: 3, message_type: MESSAGE_TYPE_DIRECT, encrypted_size: 1000, signature_size: dna_crypto::sizes::SIGNATURE as u32 };
        let bytes = header.encode();
        let parsed = Header::decode(&bytes).unwrap();
        assert_eq!(parsed.recipient_count, 3);
        assert_eq!(parsed.encrypted_size, 1000);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = Header { enc_key_type: 0, recipient_count: 0, message_type: 0, encrypted_size: 0, signature_size: 0 }.encode();
        bytes[0] = b'X';
        assert!(matches!(Header::decode(&bytes), Err(CodecError::Protocol(_))));
    }

    #[test]
    fn truncated_buffer_rejected() {
        assert!(matches!(Header::decode(&[0u8; 5]), Err(CodecError::Protocol(_))));
    }

    #[test]
    fn addressed_to_checks_recipient_table_without_decrypting() {
        use dna_crypto::keys::{KemKeyPair, SigningKeyPair};

        let sender_signing = SigningKeyPair::generate();
        let sender_fp = dna_crypto::sha3_512(&sender_signing.public);
        let alice_kem = KemKeyPair::generate();
        let alice_fp = [1u8; 64];
        let bob_fp = [2u8; 64];

        let packet = crate::encoder::encode_direct(
            &sender_fp,
            &sender_signing,
            &[(alice_fp, alice_kem.public.clone())],
            b"hi",
        )
        .unwrap();

        assert!(envelope_addressed_to(&packet, &alice_fp));
        assert!(!envelope_addressed_to(&packet, &bob_fp));
    }

    #[test]
    fn group_envelope_target_reads_uuid_and_version_without_the_gsk() {
        use dna_crypto::keys::SigningKeyPair;

        let sender_signing = SigningKeyPair::generate();
        let sender_fp = dna_crypto::sha3_512(&sender_signing.public);
        let group_uuid = uuid::Uuid::new_v4();

        let packet =
            crate::encoder::encode_group(&sender_fp, &sender_signing, &group_uuid, 7, &[0u8; 32], b"hi").unwrap();

        assert_eq!(group_envelope_target(&packet), Some((group_uuid, 7)));
        assert_eq!(group_envelope_target(b"not an envelope"), None);
    }
}
