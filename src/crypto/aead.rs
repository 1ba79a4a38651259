/*!
Authenticated encryption for the key-confirmation exchange.

ChaCha20-Poly1305 with a fresh random 96-bit nonce per call. The
confirmation key is used for exactly one message per handshake, so the
nonce-reuse exposure is bounded to that single use.
*/

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};

use crate::constants::sizes::chacha;
use crate::error::{AuthError, CryptoError, Error, Result};

/// One AEAD confirmation message as carried on the wire.
///
/// The tag travels as a separate field; internally it is the
/// Poly1305 tag split off the combined ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPayload {
    /// Random per-message nonce
    pub nonce: [u8; chacha::NONCE_SIZE],
    /// Ciphertext without the tag
    pub ciphertext: Vec<u8>,
    /// Poly1305 authentication tag
    pub tag: [u8; chacha::TAG_SIZE],
}

/// AEAD cipher bound to one confirmation key
pub struct ConfirmationCipher {
    cipher: ChaCha20Poly1305,
}

impl ConfirmationCipher {
    /// Create a cipher for the given confirmation key
    pub fn new(key: &[u8; chacha::KEY_SIZE]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Encrypt a plaintext under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<ConfirmPayload> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let mut combined = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::Crypto(CryptoError::EncryptionFailed))?;

        let tag_offset = combined.len() - chacha::TAG_SIZE;
        let mut tag = [0u8; chacha::TAG_SIZE];
        tag.copy_from_slice(&combined[tag_offset..]);
        combined.truncate(tag_offset);

        let mut nonce_bytes = [0u8; chacha::NONCE_SIZE];
        nonce_bytes.copy_from_slice(&nonce);

        Ok(ConfirmPayload {
            nonce: nonce_bytes,
            ciphertext: combined,
            tag,
        })
    }

    /// Decrypt a confirmation payload, failing closed.
    ///
    /// An invalid tag yields `Error::Authentication` and no plaintext.
    pub fn open(&self, payload: &ConfirmPayload) -> Result<Vec<u8>> {
        let mut combined =
            Vec::with_capacity(payload.ciphertext.len() + chacha::TAG_SIZE);
        combined.extend_from_slice(&payload.ciphertext);
        combined.extend_from_slice(&payload.tag);

        self.cipher
            .decrypt(Nonce::from_slice(&payload.nonce), combined.as_slice())
            .map_err(|_| Error::Authentication(AuthError::TagVerificationFailed))
    }
}
