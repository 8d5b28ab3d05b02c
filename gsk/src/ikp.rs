//! Initial Key Packet binary codec (spec.md §3) and verification rules
//! (spec.md §4.3).
//!
//! Layout: header `group_uuid(37) || version(u32 BE) || member_count(u8)`,
//! then `member_count` fixed 1,672-byte entries
//! (`fingerprint(64) || kem_ciphertext(1568) || wrapped_key(40)`), then a
//! trailer `signature_type(1) || signature_len(u16 BE) || signature`.

use subtle::ConstantTimeEq;

use dna_crypto::keys::SigningKeyPair;
use dna_crypto::sizes::{KEM_CIPHERTEXT, WRAPPED_KEY};
use dna_crypto::{aes_keyunwrap, aes_keywrap, kem_decap, kem_encap, sig_sign, sig_verify};
use dna_identity::Fingerprint;

use crate::error::{GskError, Result};

const UUID_FIELD_LEN: usize = 37;
const HEADER_LEN: usize = UUID_FIELD_LEN + 4 + 1;
const MEMBER_ENTRY_LEN: usize = 64 + KEM_CIPHERTEXT + WRAPPED_KEY;
const SIGNATURE_TYPE_DILITHIUM5: u8 = 1;

pub struct MemberEntry {
    pub fingerprint: Fingerprint,
    pub kem_ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
}

pub struct ParsedIkp {
    pub group_uuid: String,
    pub version: u32,
    pub members: Vec<MemberEntry>,
}

fn encode_uuid(uuid: &str) -> [u8; UUID_FIELD_LEN] {
    let mut out = [0u8; UUID_FIELD_LEN];
    let bytes = uuid.as_bytes();
    let n = bytes.len().min(UUID_FIELD_LEN - 1);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

fn decode_uuid(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Build and sign a fresh IKP for `gsk`, encapsulating it to each member's
/// KEM public key.
pub fn build(
    group_uuid: &str,
    version: u32,
    gsk: &[u8; 32],
    members: &[(Fingerprint, Vec<u8>)],
    owner_signing_key: &SigningKeyPair,
) -> Result<Vec<u8>> {
    if members.is_empty() {
        return Err(GskError::EmptyMembership);
    }
    if members.len() > u8::MAX as usize {
        return Err(GskError::TooManyMembers { actual: members.len() });
    }

    let mut body = Vec::with_capacity(HEADER_LEN + MEMBER_ENTRY_LEN * members.len());
    body.extend_from_slice(&encode_uuid(group_uuid));
    body.extend_from_slice(&version.to_be_bytes());
    body.push(members.len() as u8);

    for (fingerprint, kem_public_key) in members {
        let (ciphertext, kek) = kem_encap(kem_public_key)?;
        let wrapped = aes_keywrap(&*kek, gsk)?;
        body.extend_from_slice(fingerprint);
        body.extend_from_slice(&ciphertext);
        body.extend_from_slice(&wrapped);
    }

    let signature = sig_sign(&owner_signing_key.secret.0, &body)?;
    let mut packet = body;
    packet.push(SIGNATURE_TYPE_DILITHIUM5);
    packet.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    packet.extend_from_slice(&signature);
    Ok(packet)
}

/// Parse and verify an IKP against the owner's signing public key. Applies
/// every rejection rule from spec.md §4.3 except the own-fingerprint check,
/// which is a separate step (`find_own_entry`) so callers can distinguish
/// "not a member" from "malformed packet".
pub fn parse(bytes: &[u8], owner_signing_public_key: &[u8]) -> Result<ParsedIkp> {
    if bytes.len() < HEADER_LEN {
        return Err(GskError::BadHeader);
    }

    let group_uuid = decode_uuid(&bytes[0..UUID_FIELD_LEN]);
    let version = u32::from_be_bytes(bytes[UUID_FIELD_LEN..UUID_FIELD_LEN + 4].try_into().unwrap());
    let member_count = bytes[UUID_FIELD_LEN + 4] as usize;
    if member_count == 0 {
        return Err(GskError::EmptyMembership);
    }

    let members_end = HEADER_LEN + MEMBER_ENTRY_LEN * member_count;
    if bytes.len() < members_end + 3 {
        return Err(GskError::SizeMismatch { expected: members_end + 3, actual: bytes.len() });
    }

    let sig_type_offset = members_end;
    let sig_len_offset = sig_type_offset + 1;
    let sig_start = sig_len_offset + 2;
    let sig_len = u16::from_be_bytes(bytes[sig_len_offset..sig_start].try_into().unwrap()) as usize;
    let expected_total = sig_start + sig_len;
    if bytes.len() != expected_total {
        return Err(GskError::SizeMismatch { expected: expected_total, actual: bytes.len() });
    }

    let signed_body = &bytes[0..members_end];
    let signature = &bytes[sig_start..expected_total];
    if !sig_verify(owner_signing_public_key, signed_body, signature)? {
        return Err(GskError::BadSignature);
    }

    let mut members = Vec::with_capacity(member_count);
    for i in 0..member_count {
        let start = HEADER_LEN + i * MEMBER_ENTRY_LEN;
        let fingerprint: Fingerprint = bytes[start..start + 64].try_into().unwrap();
        let kem_ciphertext = bytes[start + 64..start + 64 + KEM_CIPHERTEXT].to_vec();
        let wrapped_key = bytes[start + 64 + KEM_CIPHERTEXT..start + MEMBER_ENTRY_LEN].to_vec();
        members.push(MemberEntry { fingerprint, kem_ciphertext, wrapped_key });
    }

    Ok(ParsedIkp { group_uuid, version, members })
}

/// Constant-time scan for `my_fingerprint` across every entry, regardless of
/// whether an earlier entry already matched — avoids leaking this member's
/// position in the list via timing.
pub fn find_own_entry<'a>(parsed: &'a ParsedIkp, my_fingerprint: &Fingerprint) -> Option<&'a MemberEntry> {
    let mut found: Option<&MemberEntry> = None;
    for entry in &parsed.members {
        if bool::from(entry.fingerprint[..].ct_eq(&my_fingerprint[..])) {
            found = Some(entry);
        }
    }
    found
}

/// Decapsulate and unwrap the GSK for the local member's entry.
pub fn recover_gsk(entry: &MemberEntry, my_kem_secret_key: &[u8]) -> Result<[u8; 32]> {
    let kek = kem_decap(&entry.kem_ciphertext, my_kem_secret_key)?;
    let unwrapped = aes_keyunwrap(&*kek, &entry.wrapped_key)?;
    let mut gsk = [0u8; 32];
    gsk.copy_from_slice(&unwrapped);
    Ok(gsk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_crypto::keys::KemKeyPair;

    fn sample_members(n: usize) -> (Vec<(Fingerprint, Vec<u8>)>, Vec<KemKeyPair>) {
        let mut fps = Vec::new();
        let mut keys = Vec::new();
        for i in 0..n {
            let kp = KemKeyPair::generate();
            let mut fp = [0u8; 64];
            fp[0] = i as u8;
            fps.push((fp, kp.public.clone()));
            keys.push(kp);
        }
        (fps, keys)
    }

    #[test]
    fn build_then_parse_roundtrips_and_every_member_recovers_gsk() {
        let owner = SigningKeyPair::generate();
        let (members, kem_keys) = sample_members(3);
        let gsk = [42u8; 32];

        let packet = build("11111111-1111-1111-1111-111111111111", 0, &gsk, &members, &owner).unwrap();
        let parsed = parse(&packet, &owner.public).unwrap();
        assert_eq!(parsed.members.len(), 3);
        assert_eq!(parsed.version, 0);

        for (i, (fp, _)) in members.iter().enumerate() {
            let entry = find_own_entry(&parsed, fp).expect("member present");
            let recovered = recover_gsk(entry, &kem_keys[i].secret.0).unwrap();
            assert_eq!(recovered, gsk);
        }
    }

    #[test]
    fn non_member_fingerprint_is_not_found() {
        let owner = SigningKeyPair::generate();
        let (members, _keys) = sample_members(2);
        let packet = build("uuid", 0, &[1u8; 32], &members, &owner).unwrap();
        let parsed = parse(&packet, &owner.public).unwrap();
        let stranger = [99u8; 64];
        assert!(find_own_entry(&parsed, &stranger).is_none());
    }

    #[test]
    fn tampered_body_fails_signature_check() {
        let owner = SigningKeyPair::generate();
        let (members, _keys) = sample_members(1);
        let mut packet = build("uuid", 0, &[1u8; 32], &members, &owner).unwrap();
        packet[0] ^= 0xFF;
        assert!(matches!(parse(&packet, &owner.public), Err(GskError::BadSignature)));
    }

    #[test]
    fn zero_member_count_is_rejected() {
        let owner = SigningKeyPair::generate();
        let result = build("uuid", 0, &[1u8; 32], &[], &owner);
        assert!(matches!(result, Err(GskError::EmptyMembership)));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let owner = SigningKeyPair::generate();
        let (members, _keys) = sample_members(1);
        let packet = build("uuid", 0, &[1u8; 32], &members, &owner).unwrap();
        let truncated = &packet[..packet.len() - 10];
        assert!(matches!(parse(truncated, &owner.public), Err(GskError::SizeMismatch { .. })));
    }
}
