//! AES key wrap (RFC 3394) — wraps a 32-byte key under a KEM-derived KEK.

use crate::error::{CryptoError, Result};
use aes_kw::Kek;

/// Wrap a 32-byte key under `kek` (also 32 bytes). Output is 40 bytes
/// (32 + the 8-byte RFC 3394 integrity block).
pub fn aes_keywrap(kek: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if kek.len() != 32 {
        return Err(CryptoError::BadLength { expected: 32, actual: kek.len() });
    }
    if key.len() != 32 {
        return Err(CryptoError::BadLength { expected: 32, actual: key.len() });
    }
    let kek = Kek::try_from(kek).map_err(|_| CryptoError::BadLength { expected: 32, actual: kek.len() })?;
    let mut wrapped = [0u8; 40];
    kek.wrap(key, &mut wrapped).map_err(|_| CryptoError::BadKeyWrap)?;
    Ok(wrapped.to_vec())
}

/// Unwrap a 40-byte wrapped blob, returning the 32-byte key. The RFC 3394
/// integrity check doubles as a MAC: a wrong `kek` fails here, not silently.
pub fn aes_keyunwrap(kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>> {
    if kek.len() != 32 {
        return Err(CryptoError::BadLength { expected: 32, actual: kek.len() });
    }
    if wrapped.len() != 40 {
        return Err(CryptoError::BadLength { expected: 40, actual: wrapped.len() });
    }
    let kek = Kek::try_from(kek).map_err(|_| CryptoError::BadLength { expected: 32, actual: kek.len() })?;
    let mut out = [0u8; 32];
    kek.unwrap(wrapped, &mut out).map_err(|_| CryptoError::BadKeyWrap)?;
    Ok(out.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::random_bytes;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let kek = random_bytes(32);
        let key = random_bytes(32);
        let wrapped = aes_keywrap(&kek, &key).unwrap();
        assert_eq!(wrapped.len(), 40);
        let unwrapped = aes_keyunwrap(&kek, &wrapped).unwrap();
        assert_eq!(unwrapped, key);
    }

    #[test]
    fn wrong_kek_fails_integrity_check() {
        let kek = random_bytes(32);
        let wrong_kek = random_bytes(32);
        let key = random_bytes(32);
        let wrapped = aes_keywrap(&kek, &key).unwrap();
        assert!(matches!(aes_keyunwrap(&wrong_kek, &wrapped), Err(CryptoError::BadKeyWrap)));
    }
}
