//! Envelope decoding: signature verification first, then the
//! message-type-specific unwrap (spec.md §4.7).

use subtle::ConstantTimeEq;

use dna_crypto::{aes_gcm_open, aes_keyunwrap, kem_decap, sig_verify};
use dna_identity::Fingerprint;

use crate::envelope::{
    Header, GROUP_TABLE_LEN, MESSAGE_TYPE_DIRECT, MESSAGE_TYPE_GROUP, NONCE_LEN,
    RECIPIENT_ENTRY_LEN, SENDER_PAYLOAD_PREFIX_LEN,
};
use crate::error::{CodecError, Result};

/// Looks up a previously-installed group session key by `(group_uuid, version)`.
/// `dna-codec` has no dependency on `dna-gsk`; the orchestration layer
/// (`dna-core`) supplies an implementation backed by its `GskManager`.
pub trait GskLookup {
    fn lookup(&self, group_uuid: &uuid::Uuid, gsk_version: u32) -> Option<[u8; 32]>;
}

pub struct Decoded {
    pub sender_fingerprint: Fingerprint,
    pub timestamp: u64,
    pub plaintext: Vec<u8>,
}

/// Decode `packet`, verifying it was signed by `expected_signer_public_key`.
/// Callers that don't yet know the sender try each candidate contact's
/// signing key in turn; that trial-and-error is an orchestration concern,
/// not this function's.
pub fn decode(
    packet: &[u8],
    my_fingerprint: &Fingerprint,
    my_kem_secret_key: &[u8],
    expected_signer_public_key: &[u8],
    gsk_lookup: &dyn GskLookup,
) -> Result<Decoded> {
    let header = Header::decode(packet)?;

    let table_len = match header.message_type {
        MESSAGE_TYPE_DIRECT => RECIPIENT_ENTRY_LEN * header.recipient_count as usize,
        MESSAGE_TYPE_GROUP => GROUP_TABLE_LEN,
        other => return Err(CodecError::Protocol(format!("unknown message_type {other}"))),
    };

    let header_len = crate::envelope::HEADER_LEN;
    let table_start = header_len;
    let table_end = table_start.checked_add(table_len).ok_or_else(|| CodecError::Protocol("table length overflow".into()))?;
    let gcm_start = table_end;
    let gcm_end = gcm_start
        .checked_add(header.encrypted_size as usize)
        .ok_or_else(|| CodecError::Protocol("encrypted_size overflow".into()))?;
    let sig_start = gcm_end;
    let sig_end = sig_start
        .checked_add(header.signature_size as usize)
        .ok_or_else(|| CodecError::Protocol("signature_size overflow".into()))?;
    if packet.len() != sig_end {
        return Err(CodecError::Protocol(format!(
            "packet length {} does not match header-declared length {}",
            packet.len(),
            sig_end
        )));
    }

    let signed_region = &packet[0..gcm_end];
    let signature = &packet[sig_start..sig_end];
    if !sig_verify(expected_signer_public_key, signed_region, signature)? {
        return Err(CodecError::Unauthorized);
    }

    let table = &packet[table_start..table_end];
    let gcm_block = &packet[gcm_start..gcm_end];
    if gcm_block.len() < NONCE_LEN {
        return Err(CodecError::Protocol("gcm block shorter than a nonce".into()));
    }
    let nonce = &gcm_block[..NONCE_LEN];
    let ciphertext_and_tag = &gcm_block[NONCE_LEN..];
    let aad = &packet[0..header_len];

    let payload = match header.message_type {
        MESSAGE_TYPE_DIRECT => {
            let entry = find_recipient_entry(table, header.recipient_count as usize, my_fingerprint)
                .ok_or(CodecError::NotForMe)?;
            let kek = kem_decap(entry.kem_ciphertext, my_kem_secret_key)?;
            let dek = aes_keyunwrap(&*kek, entry.wrapped_key)?;
            aes_gcm_open(&dek, nonce, aad, ciphertext_and_tag)?
        }
        MESSAGE_TYPE_GROUP => {
            let group_uuid = uuid::Uuid::from_slice(&table[0..16])
                .map_err(|_| CodecError::Protocol("malformed group_uuid".into()))?;
            let gsk_version = u32::from_be_bytes(table[16..20].try_into().unwrap());
            let gsk = gsk_lookup.lookup(&group_uuid, gsk_version).ok_or(CodecError::NotFound)?;
            aes_gcm_open(&gsk, nonce, aad, ciphertext_and_tag)?
        }
        _ => unreachable!("message_type already validated above"),
    };

    if payload.len() < SENDER_PAYLOAD_PREFIX_LEN {
        return Err(CodecError::Protocol("decrypted payload shorter than its sender prefix".into()));
    }
    let sender_fingerprint: Fingerprint = payload[0..64].try_into().unwrap();
    let timestamp = u64::from_be_bytes(payload[64..72].try_into().unwrap());
    let plaintext = payload[SENDER_PAYLOAD_PREFIX_LEN..].to_vec();

    if header.message_type == MESSAGE_TYPE_GROUP {
        let signer_fingerprint = dna_identity::fingerprint_of(expected_signer_public_key);
        if !bool::from(signer_fingerprint[..].ct_eq(&sender_fingerprint[..])) {
            return Err(CodecError::Unauthorized);
        }
    }

    Ok(Decoded { sender_fingerprint, timestamp, plaintext })
}

struct RecipientEntry<'a> {
    kem_ciphertext: &'a [u8],
    wrapped_key: &'a [u8],
}

/// Constant-time scan across every recipient entry, regardless of whether an
/// earlier one already matched.
fn find_recipient_entry<'a>(table: &'a [u8], count: usize, my_fingerprint: &Fingerprint) -> Option<RecipientEntry<'a>> {
    let mut found = None;
    for i in 0..count {
        let start = i * RECIPIENT_ENTRY_LEN;
        let fp = &table[start..start + 64];
        if bool::from(fp.ct_eq(&my_fingerprint[..])) {
            let kem_ciphertext = &table[start + 64..start + 64 + dna_crypto::sizes::KEM_CIPHERTEXT];
            let wrapped_key = &table[start + 64 + dna_crypto::sizes::KEM_CIPHERTEXT..start + RECIPIENT_ENTRY_LEN];
            found = Some(RecipientEntry { kem_ciphertext, wrapped_key });
        }
    }
    found
}

/// Reject messages whose embedded timestamp falls outside `skew_secs` of
/// `now` in either direction, guarding against stale replayed envelopes.
pub fn within_replay_window(timestamp: u64, now: u64, skew_secs: u64) -> bool {
    let diff = if now >= timestamp { now - timestamp } else { timestamp - now };
    diff <= skew_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_crypto::keys::{KemKeyPair, SigningKeyPair};
    use dna_identity::fingerprint_of;

    struct NoGroups;
    impl GskLookup for NoGroups {
        fn lookup(&self, _group_uuid: &uuid::Uuid, _gsk_version: u32) -> Option<[u8; 32]> {
            None
        }
    }

    struct OneGroup {
        group_uuid: uuid::Uuid,
        gsk_version: u32,
        gsk: [u8; 32],
    }
    impl GskLookup for OneGroup {
        fn lookup(&self, group_uuid: &uuid::Uuid, gsk_version: u32) -> Option<[u8; 32]> {
            if *group_uuid == self.group_uuid && gsk_version == self.gsk_version { Some(self.gsk) } else { None }
        }
    }

    #[test]
    fn direct_roundtrip() {
        let sender_signing = SigningKeyPair::generate();
        let sender_fp = fingerprint_of(&sender_signing.public);
        let alice_kem = KemKeyPair::generate();
        let alice_fp = fingerprint_of(&SigningKeyPair::generate().public);

        let packet = crate::encoder::encode_direct(
            &sender_fp,
            &sender_signing,
            &[(alice_fp, alice_kem.public.clone())],
            b"hello alice",
        )
        .unwrap();

        let decoded =
            decode(&packet, &alice_fp, &alice_kem.secret.0, &sender_signing.public, &NoGroups).unwrap();
        assert_eq!(decoded.sender_fingerprint, sender_fp);
        assert_eq!(decoded.plaintext, b"hello alice");
    }

    #[test]
    fn direct_wrong_recipient_is_not_for_me() {
        let sender_signing = SigningKeyPair::generate();
        let sender_fp = fingerprint_of(&sender_signing.public);
        let alice_kem = KemKeyPair::generate();
        let alice_fp = fingerprint_of(&SigningKeyPair::generate().public);
        let bob_fp = [7u8; 64];

        let packet = crate::encoder::encode_direct(
            &sender_fp,
            &sender_signing,
            &[(alice_fp, alice_kem.public.clone())],
            b"hi",
        )
        .unwrap();

        let result = decode(&packet, &bob_fp, &alice_kem.secret.0, &sender_signing.public, &NoGroups);
        assert!(matches!(result, Err(CodecError::NotForMe)));
    }

    #[test]
    fn wrong_signer_key_is_unauthorized() {
        let sender_signing = SigningKeyPair::generate();
        let sender_fp = fingerprint_of(&sender_signing.public);
        let alice_kem = KemKeyPair::generate();
        let alice_fp = fingerprint_of(&SigningKeyPair::generate().public);
        let impostor = SigningKeyPair::generate();

        let packet = crate::encoder::encode_direct(
            &sender_fp,
            &sender_signing,
            &[(alice_fp, alice_kem.public.clone())],
            b"hi",
        )
        .unwrap();

        let result = decode(&packet, &alice_fp, &alice_kem.secret.0, &impostor.public, &NoGroups);
        assert!(matches!(result, Err(CodecError::Unauthorized)));
    }

    #[test]
    fn group_roundtrip_checks_sender_fingerprint_inside_plaintext() {
        let sender_signing = SigningKeyPair::generate();
        let sender_fp = fingerprint_of(&sender_signing.public);
        let group_uuid = uuid::Uuid::new_v4();
        let gsk = [9u8; 32];

        let packet =
            crate::encoder::encode_group(&sender_fp, &sender_signing, &group_uuid, 1, &gsk, b"group hi").unwrap();

        let lookup = OneGroup { group_uuid, gsk_version: 1, gsk };
        let decoded = decode(&packet, &sender_fp, &[], &sender_signing.public, &lookup).unwrap();
        assert_eq!(decoded.plaintext, b"group hi");
    }

    #[test]
    fn group_missing_gsk_is_not_found() {
        let sender_signing = SigningKeyPair::generate();
        let sender_fp = fingerprint_of(&sender_signing.public);
        let group_uuid = uuid::Uuid::new_v4();

        let packet =
            crate::encoder::encode_group(&sender_fp, &sender_signing, &group_uuid, 1, &[1u8; 32], b"hi").unwrap();

        let result = decode(&packet, &sender_fp, &[], &sender_signing.public, &NoGroups);
        assert!(matches!(result, Err(CodecError::NotFound)));
    }

    #[test]
    fn replay_window_accepts_recent_and_rejects_stale() {
        assert!(within_replay_window(1_000, 1_030, 60));
        assert!(!within_replay_window(1_000, 2_000, 60));
    }
}
