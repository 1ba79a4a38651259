/*!
Constants for the KEMTLS channel.

This module contains protocol constants including frame sizes,
key sizes, derivation labels, and configuration defaults.
*/

/// Size constants for the protocol
pub mod sizes {
    /// Frame wire format constants
    pub mod frame {
        /// Size of the big-endian length prefix in bytes
        pub const LENGTH_PREFIX: usize = 4;
    }

    /// CRYSTALS-Kyber constants (Kyber768, the default parameter set)
    pub mod kyber {
        /// Size of Kyber768 public key in bytes
        pub const PUBLIC_KEY_BYTES: usize = 1184;

        /// Size of Kyber768 secret key in bytes
        pub const SECRET_KEY_BYTES: usize = 2400;

        /// Size of Kyber768 ciphertext in bytes
        pub const CIPHERTEXT_BYTES: usize = 1088;

        /// Size of Kyber shared secret in bytes
        pub const SHARED_SECRET_BYTES: usize = 32;
    }

    /// ChaCha20-Poly1305 constants
    pub mod chacha {
        /// Size of ChaCha20-Poly1305 authentication tag in bytes
        pub const TAG_SIZE: usize = 16;

        /// Size of ChaCha20-Poly1305 nonce in bytes
        pub const NONCE_SIZE: usize = 12;

        /// Size of ChaCha20-Poly1305 key in bytes
        pub const KEY_SIZE: usize = 32;
    }

    /// Derived key material constants
    pub mod keys {
        /// Size of each derived subkey in bytes
        pub const SUBKEY_BYTES: usize = 32;

        /// Total HKDF output length: four independent 32-byte subkeys
        pub const KEY_SET_BYTES: usize = 4 * SUBKEY_BYTES;
    }
}

/// Info string for HKDF expansion of the combined shared secret
pub const HKDF_INFO: &[u8] = b"KEMTLS-v1";

/// Fixed plaintext of the server's key-confirmation message
pub const CONFIRMATION_PLAINTEXT: &[u8] = b"SERVER_OK";

/// Placeholder certificate body sent in `ServerHello`.
///
/// Explicitly simulated: no trust chain is carried or verified.
pub const CERTIFICATE_PLACEHOLDER: &[u8] = b"server-cert-placeholder";

/// Configuration defaults
pub mod defaults {
    use std::time::Duration;

    /// Default maximum frame size (1 MiB).
    ///
    /// Bounds memory use against a malicious or broken peer declaring
    /// an absurd length.
    pub const MAX_FRAME_SIZE: usize = 1_048_576;

    /// Default deadline for each handshake step's expected message
    pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);
}
