/*!
Key derivation for the KEMTLS handshake.

One HKDF-SHA256 expansion of the combined shared secret produces four
independent 32-byte subkeys. The derivation is pure: identical inputs
always yield identical outputs.
*/

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;

use crate::constants::{HKDF_INFO, sizes::keys};
use crate::error::{CryptoError, Error, Result};

/// Negotiated 32-byte session key.
///
/// `Debug` is redacted so the key never lands in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; keys::SUBKEY_BYTES]);

impl SessionKey {
    /// View the raw key bytes
    pub fn as_bytes(&self) -> &[u8; keys::SUBKEY_BYTES] {
        &self.0
    }
}

impl From<[u8; keys::SUBKEY_BYTES]> for SessionKey {
    fn from(bytes: [u8; keys::SUBKEY_BYTES]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey(..)")
    }
}

/// The four subkeys produced by one expansion, in wire-fixed order.
///
/// Only `session_key` and `confirmation_key` are consumed by the
/// protocol. The reserved keys are produced and carried but have no
/// assigned semantics.
pub struct KeySet {
    /// Key protecting application traffic after establishment
    pub session_key: SessionKey,
    /// Key used for exactly one AEAD confirmation message
    pub confirmation_key: [u8; keys::SUBKEY_BYTES],
    /// Reserved output, unconsumed
    pub reserved1: [u8; keys::SUBKEY_BYTES],
    /// Reserved output, unconsumed
    pub reserved2: [u8; keys::SUBKEY_BYTES],
}

/// Expand `ss_e || ss_s` into a [`KeySet`].
///
/// The concatenation order is fixed; both sides must pass the ephemeral
/// shared secret first or they derive disjoint keys.
pub fn derive_key_set(ss_e: &[u8], ss_s: &[u8]) -> Result<KeySet> {
    let mut ikm = Vec::with_capacity(ss_e.len() + ss_s.len());
    ikm.extend_from_slice(ss_e);
    ikm.extend_from_slice(ss_s);

    let hkdf = Hkdf::<Sha256>::new(None, &ikm);
    let mut okm = [0u8; keys::KEY_SET_BYTES];
    hkdf.expand(HKDF_INFO, &mut okm)
        .map_err(|_| Error::Crypto(CryptoError::KeyDerivationFailed))?;

    let mut subkeys = [[0u8; keys::SUBKEY_BYTES]; 4];
    for (i, subkey) in subkeys.iter_mut().enumerate() {
        subkey.copy_from_slice(&okm[i * keys::SUBKEY_BYTES..(i + 1) * keys::SUBKEY_BYTES]);
    }
    let [session, confirmation, reserved1, reserved2] = subkeys;

    Ok(KeySet {
        session_key: SessionKey::from(session),
        confirmation_key: confirmation,
        reserved1,
        reserved2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() -> Result<()> {
        let ss_e = [0x11u8; 32];
        let ss_s = [0x22u8; 32];

        let a = derive_key_set(&ss_e, &ss_s)?;
        let b = derive_key_set(&ss_e, &ss_s)?;

        assert_eq!(a.session_key, b.session_key);
        assert_eq!(a.confirmation_key, b.confirmation_key);
        assert_eq!(a.reserved1, b.reserved1);
        assert_eq!(a.reserved2, b.reserved2);
        Ok(())
    }

    #[test]
    fn test_concatenation_order_matters() -> Result<()> {
        let ss_e = [0x11u8; 32];
        let ss_s = [0x22u8; 32];

        let forward = derive_key_set(&ss_e, &ss_s)?;
        let swapped = derive_key_set(&ss_s, &ss_e)?;
        assert_ne!(forward.session_key, swapped.session_key);
        Ok(())
    }

    #[test]
    fn test_subkeys_are_independent() -> Result<()> {
        let key_set = derive_key_set(&[0x33u8; 32], &[0x44u8; 32])?;

        // No two subkeys of one expansion may coincide
        let keys = [
            *key_set.session_key.as_bytes(),
            key_set.confirmation_key,
            key_set.reserved1,
            key_set.reserved2,
        ];
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
        Ok(())
    }

    #[test]
    fn test_session_key_debug_is_redacted() {
        let key_set = derive_key_set(&[1u8; 32], &[2u8; 32]).unwrap();
        assert_eq!(format!("{:?}", key_set.session_key), "SessionKey(..)");
    }
}
