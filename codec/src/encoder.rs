//! Envelope encoding: direct (one DEK wrapped per recipient via KEM) and
//! group-GSK (shared key, constant overhead regardless of membership size).

use dna_crypto::keys::SigningKeyPair;
use dna_crypto::{aes_gcm_seal, kem_encap, random::random_key32, random_nonce, sig_sign};
use dna_identity::Fingerprint;

use crate::envelope::{
    Header, ENC_KEY_TYPE_GSK, ENC_KEY_TYPE_KYBER1024, GROUP_TABLE_LEN, MESSAGE_TYPE_DIRECT, MESSAGE_TYPE_GROUP,
    RECIPIENT_ENTRY_LEN,
};
use crate::error::Result;

fn now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn payload_with_header(sender_fp: &Fingerprint, plaintext: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64 + 8 + plaintext.len());
    payload.extend_from_slice(sender_fp);
    payload.extend_from_slice(&now_secs().to_be_bytes());
    payload.extend_from_slice(plaintext);
    payload
}

/// Encode a direct message: a fresh DEK encrypts the payload once; each
/// recipient gets their own KEM-wrapped copy of that DEK.
pub fn encode_direct(
    sender_fp: &Fingerprint,
    sender_signing_key: &SigningKeyPair,
    recipients: &[(Fingerprint, Vec<u8>)],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if recipients.len() > u8::MAX as usize {
        return Err(crate::error::CodecError::Capacity { count: recipients.len() });
    }
    let dek = random_key32();

    let mut table = Vec::with_capacity(RECIPIENT_ENTRY_LEN * recipients.len());
    for (fp, kem_public_key) in recipients {
        let (ciphertext, kek) = kem_encap(kem_public_key)?;
        let wrapped = dna_crypto::aes_keywrap(&*kek, &dek)?;
        table.extend_from_slice(fp);
        table.extend_from_slice(&ciphertext);
        table.extend_from_slice(&wrapped);
    }

    let nonce = random_nonce();
    let payload = payload_with_header(sender_fp, plaintext);
    let encrypted_size = (nonce.len() + payload.len() + crate::envelope::TAG_LEN) as u32;
    let header = Header {
        enc_key_type: ENC_KEY_TYPE_KYBER1024,
        recipient_count: recipients.len() as u8,
        message_type: MESSAGE_TYPE_DIRECT,
        encrypted_size,
        signature_size: dna_crypto::sizes::SIGNATURE as u32,
    };
    let aad = header.encode();
    let sealed = aes_gcm_seal(&dek, &nonce, &aad, &payload)?;

    let mut gcm_block = Vec::with_capacity(nonce.len() + sealed.len());
    gcm_block.extend_from_slice(&nonce);
    gcm_block.extend_from_slice(&sealed);
    debug_assert_eq!(gcm_block.len() as u32, header.encrypted_size);

    let mut signed_region = Vec::with_capacity(HEADER_RESERVE + table.len() + gcm_block.len());
    signed_region.extend_from_slice(&header.encode());
    signed_region.extend_from_slice(&table);
    signed_region.extend_from_slice(&gcm_block);

    let signature = sig_sign(&sender_signing_key.secret.0, &signed_region)?;
    let mut packet = signed_region;
    packet.extend_from_slice(&signature);
    Ok(packet)
}

const HEADER_RESERVE: usize = crate::envelope::HEADER_LEN;

/// Encode a group message under the group's current GSK. Overhead is
/// constant: one 20-byte `group_uuid || gsk_version` table regardless of
/// member count.
pub fn encode_group(
    sender_fp: &Fingerprint,
    sender_signing_key: &SigningKeyPair,
    group_uuid: &uuid::Uuid,
    gsk_version: u32,
    gsk: &[u8; 32],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let mut table = Vec::with_capacity(GROUP_TABLE_LEN);
    table.extend_from_slice(group_uuid.as_bytes());
    table.extend_from_slice(&gsk_version.to_be_bytes());

    let nonce = random_nonce();
    let payload = payload_with_header(sender_fp, plaintext);
    let encrypted_size = (nonce.len() + payload.len() + crate::envelope::TAG_LEN) as u32;
    let header = Header {
        enc_key_type: ENC_KEY_TYPE_GSK,
        recipient_count: 0,
        message_type: MESSAGE_TYPE_GROUP,
        encrypted_size,
        signature_size: dna_crypto::sizes::SIGNATURE as u32,
    };
    let aad = header.encode();
    let sealed = aes_gcm_seal(gsk, &nonce, &aad, &payload)?;

    let mut gcm_block = Vec::with_capacity(nonce.len() + sealed.len());
    gcm_block.extend_from_slice(&nonce);
    gcm_block.extend_from_slice(&sealed);
    debug_assert_eq!(gcm_block.len() as u32, header.encrypted_size);

    let mut signed_region = Vec::with_capacity(HEADER_RESERVE + table.len() + gcm_block.len());
    signed_region.extend_from_slice(&header.encode());
    signed_region.extend_from_slice(&table);
    signed_region.extend_from_slice(&gcm_block);

    let signature = sig_sign(&sender_signing_key.secret.0, &signed_region)?;
    let mut packet = signed_region;
    packet.extend_from_slice(&signature);
    Ok(packet)
}
