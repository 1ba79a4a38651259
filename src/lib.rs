/*!
# KEMTLS Channel

A post-quantum authenticated channel establishment library: a
KEM-based analogue of a TLS-style handshake ("KEMTLS") over
length-prefixed framed byte streams.

## Overview

This library provides:

- A frame codec (4-byte big-endian length prefix) used for the whole
  connection lifetime, handshake and application traffic alike
- A four-message key-encapsulation handshake with initiator and
  responder roles, built on CRYSTALS-Kyber
- HKDF-SHA256 derivation splitting the combined shared secret into
  four independent subkeys
- An authenticated-encryption key confirmation (ChaCha20-Poly1305)
- A per-peer session registry tying established keys to live TCP
  connections, with per-step handshake deadlines and coalescing of
  concurrent establishment attempts

The KEM is consumed through the [`crypto::Kem`] capability trait; the
protocol never inspects key or ciphertext internals. Certificate
verification is an explicit placeholder (non-empty key check) and not
a trust mechanism.
*/

pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod identity;
pub mod session;

// Re-export commonly used types for convenience
pub use config::ChannelConfig;
pub use crypto::{Kem, KemAlgorithm, KeySet, KyberKem, SessionKey};
pub use error::{AuthError, CryptoError, Error, Result};
pub use framing::{FrameDecoder, encode_frame};
pub use handshake::{HandshakeMessage, HandshakeState, Role, initiate, respond};
pub use identity::ServerIdentity;
pub use session::{PeerDescriptor, SessionEvents, SessionRegistry, SessionStatus};
