/*!
Key-encapsulation capability.

The handshake consumes key encapsulation through the [`Kem`] trait and
never inspects key or ciphertext internals beyond byte length. The
shipped backend is CRYSTALS-Kyber via `pqcrypto-kyber`, with the
parameter set selected at construction time.
*/

use std::fmt;

use pqcrypto_kyber::{kyber512, kyber768, kyber1024};
use pqcrypto_traits::kem::{Ciphertext, PublicKey, SecretKey, SharedSecret};

use crate::error::{CryptoError, Error, Result};

/// KEM parameter set identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KemAlgorithm {
    /// Kyber512 (NIST level 1)
    Kyber512,
    /// Kyber768 (NIST level 3, default)
    #[default]
    Kyber768,
    /// Kyber1024 (NIST level 5)
    Kyber1024,
}

impl fmt::Display for KemAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KemAlgorithm::Kyber512 => write!(f, "Kyber512"),
            KemAlgorithm::Kyber768 => write!(f, "Kyber768"),
            KemAlgorithm::Kyber1024 => write!(f, "Kyber1024"),
        }
    }
}

/// Key-encapsulation capability consumed by the handshake.
///
/// Keys, ciphertexts, and shared secrets are opaque byte vectors at this
/// seam; backends validate formats themselves.
pub trait Kem: Send + Sync {
    /// Generate a fresh keypair, returning `(public_key, secret_key)`.
    fn generate_keypair(&self) -> Result<(Vec<u8>, Vec<u8>)>;

    /// Encapsulate to a peer's public key, returning
    /// `(shared_secret, ciphertext)`.
    fn encapsulate(&self, peer_public_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>)>;

    /// Recover the shared secret from a ciphertext with the matching
    /// secret key.
    fn decapsulate(&self, ciphertext: &[u8], secret_key: &[u8]) -> Result<Vec<u8>>;
}

/// Kyber backend for the [`Kem`] capability
pub struct KyberKem {
    algorithm: KemAlgorithm,
}

impl KyberKem {
    /// Create a backend for the given parameter set
    pub fn new(algorithm: KemAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The configured parameter set
    pub fn algorithm(&self) -> KemAlgorithm {
        self.algorithm
    }

    /// Public key size for the configured parameter set
    pub fn public_key_size(&self) -> usize {
        match self.algorithm {
            KemAlgorithm::Kyber512 => kyber512::public_key_bytes(),
            KemAlgorithm::Kyber768 => kyber768::public_key_bytes(),
            KemAlgorithm::Kyber1024 => kyber1024::public_key_bytes(),
        }
    }

    /// Ciphertext size for the configured parameter set
    pub fn ciphertext_size(&self) -> usize {
        match self.algorithm {
            KemAlgorithm::Kyber512 => kyber512::ciphertext_bytes(),
            KemAlgorithm::Kyber768 => kyber768::ciphertext_bytes(),
            KemAlgorithm::Kyber1024 => kyber1024::ciphertext_bytes(),
        }
    }
}

impl Default for KyberKem {
    fn default() -> Self {
        Self::new(KemAlgorithm::default())
    }
}

impl Kem for KyberKem {
    fn generate_keypair(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let (pk, sk) = match self.algorithm {
            KemAlgorithm::Kyber512 => {
                let (pk, sk) = kyber512::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            KemAlgorithm::Kyber768 => {
                let (pk, sk) = kyber768::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            KemAlgorithm::Kyber1024 => {
                let (pk, sk) = kyber1024::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
        };
        Ok((pk, sk))
    }

    fn encapsulate(&self, peer_public_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        match self.algorithm {
            KemAlgorithm::Kyber512 => {
                let pk = kyber512::PublicKey::from_bytes(peer_public_key)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                let (ss, ct) = kyber512::encapsulate(&pk);
                Ok((ss.as_bytes().to_vec(), ct.as_bytes().to_vec()))
            }
            KemAlgorithm::Kyber768 => {
                let pk = kyber768::PublicKey::from_bytes(peer_public_key)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                let (ss, ct) = kyber768::encapsulate(&pk);
                Ok((ss.as_bytes().to_vec(), ct.as_bytes().to_vec()))
            }
            KemAlgorithm::Kyber1024 => {
                let pk = kyber1024::PublicKey::from_bytes(peer_public_key)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                let (ss, ct) = kyber1024::encapsulate(&pk);
                Ok((ss.as_bytes().to_vec(), ct.as_bytes().to_vec()))
            }
        }
    }

    fn decapsulate(&self, ciphertext: &[u8], secret_key: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            KemAlgorithm::Kyber512 => {
                let ct = kyber512::Ciphertext::from_bytes(ciphertext)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                let sk = kyber512::SecretKey::from_bytes(secret_key)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                Ok(kyber512::decapsulate(&ct, &sk).as_bytes().to_vec())
            }
            KemAlgorithm::Kyber768 => {
                let ct = kyber768::Ciphertext::from_bytes(ciphertext)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                let sk = kyber768::SecretKey::from_bytes(secret_key)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                Ok(kyber768::decapsulate(&ct, &sk).as_bytes().to_vec())
            }
            KemAlgorithm::Kyber1024 => {
                let ct = kyber1024::Ciphertext::from_bytes(ciphertext)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                let sk = kyber1024::SecretKey::from_bytes(secret_key)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKeyFormat))?;
                Ok(kyber1024::decapsulate(&ct, &sk).as_bytes().to_vec())
            }
        }
    }
}
