/*!
Process-wide responder identity.

The responder's "static" KEM keypair is generated (or will later be
loaded) once at service startup and referenced by every handshake. It is
never regenerated per connection; that would silently discard the static
key property the protocol relies on.
*/

use crate::crypto::kem::Kem;
use crate::error::Result;

/// Long-lived KEM identity keypair of a responder.
pub struct ServerIdentity {
    public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

impl ServerIdentity {
    /// Generate a fresh identity. Call once at startup and share the
    /// result across connections.
    pub fn generate<K: Kem>(kem: &K) -> Result<Self> {
        let (public_key, secret_key) = kem.generate_keypair()?;
        Ok(Self {
            public_key,
            secret_key,
        })
    }

    /// The identity public key sent in `ServerHello`
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// The matching secret key, used only to decapsulate `ClientFinish`
    pub(crate) fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }
}
