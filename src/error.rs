/*!
Error handling for the KEMTLS channel.

Cryptographic and authentication failures deliberately carry limited
detail so that error messages cannot be used as a decryption oracle.
*/

use std::io;
use thiserror::Error;

/// Result type for the KEMTLS channel
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the KEMTLS channel
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error (connect refused, reset, write failure)
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Protocol error (malformed frame, unexpected handshake message, oversized frame)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Authentication error (limited details for security)
    #[error("authentication failed")]
    Authentication(#[source] AuthError),

    /// Cryptographic error (limited details for security)
    #[error("cryptographic operation failed")]
    Crypto(#[source] CryptoError),

    /// A handshake step's expected message never arrived within its deadline
    #[error("handshake step timed out after {0} ms")]
    Timeout(u64),

    /// Operation attempted in the wrong state
    #[error("invalid state: expected {expected}, but was {actual}")]
    InvalidState {
        expected: String,
        actual: String,
    },
}

/// Authentication errors with limited details to prevent leaking information
#[derive(Error, Debug)]
pub enum AuthError {
    /// AEAD tag verification failed
    #[error("tag verification failed")]
    TagVerificationFailed,

    /// Confirmation plaintext did not match the expected value
    #[error("key confirmation mismatch")]
    ConfirmationMismatch,

    /// The placeholder certificate carried an empty public key
    #[error("certificate public key is empty")]
    EmptyCertificateKey,
}

/// Cryptographic errors with limited details to prevent leaking information
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key generation failed
    #[error("key generation failed")]
    KeyGenerationFailed,

    /// Key encapsulation failed
    #[error("key encapsulation failed")]
    EncapsulationFailed,

    /// Key decapsulation failed
    #[error("key decapsulation failed")]
    DecapsulationFailed,

    /// Key derivation failed
    #[error("key derivation failed")]
    KeyDerivationFailed,

    /// Encryption failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// Invalid key or ciphertext format
    #[error("invalid key format")]
    InvalidKeyFormat,
}

/// Create a protocol error
pub(crate) fn protocol_err<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::Protocol(msg.into()))
}

/// Create an invalid-state error
pub(crate) fn invalid_state_err<T>(
    expected: impl ToString,
    actual: impl ToString,
) -> Result<T> {
    Err(Error::InvalidState {
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol("unexpected message type 7".to_string());
        assert_eq!(format!("{}", err), "protocol error: unexpected message type 7");

        let err = Error::Timeout(5000);
        assert_eq!(format!("{}", err), "handshake step timed out after 5000 ms");

        // Auth errors are terse at the top level
        let err = Error::Authentication(AuthError::TagVerificationFailed);
        assert_eq!(format!("{}", err), "authentication failed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Transport(_)));
    }
}
