/*!
Cryptographic building blocks of the channel: the KEM capability seam,
key-set derivation, and the AEAD confirmation cipher.
*/

pub mod aead;
pub mod kdf;
pub mod kem;

pub use aead::{ConfirmPayload, ConfirmationCipher};
pub use kdf::{KeySet, SessionKey, derive_key_set};
pub use kem::{Kem, KemAlgorithm, KyberKem};
