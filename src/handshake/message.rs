/*!
Handshake wire messages.

Each of the four handshake messages travels inside one ordinary frame.
The frame payload starts with a one-byte message tag (1 through 4),
followed by the message fields: variable-length fields carry a 4-byte
big-endian length prefix, fixed-size fields (nonce, tag) are raw.
*/

use byteorder::{BigEndian, ByteOrder};

use crate::constants::sizes::chacha;
use crate::crypto::aead::ConfirmPayload;
use crate::error::{Result, protocol_err};

/// Wire tag of the `Init` message
pub const TAG_INIT: u8 = 1;
/// Wire tag of the `ServerHello` message
pub const TAG_SERVER_HELLO: u8 = 2;
/// Wire tag of the `ClientFinish` message
pub const TAG_CLIENT_FINISH: u8 = 3;
/// Wire tag of the `Confirm` message
pub const TAG_CONFIRM: u8 = 4;

/// One of the four handshake messages, exchanged strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    /// Initiator's ephemeral public key
    Init {
        /// Ephemeral KEM public key `pk_e`
        ephemeral_public_key: Vec<u8>,
    },
    /// Responder's encapsulation and identity
    ServerHello {
        /// Ciphertext `ct_e` encapsulated to `pk_e`
        kem_ciphertext: Vec<u8>,
        /// Responder's static public key `pk_s`
        static_public_key: Vec<u8>,
        /// Placeholder certificate; carried, never verified as a trust chain
        certificate: Vec<u8>,
    },
    /// Initiator's encapsulation to the responder identity
    ClientFinish {
        /// Ciphertext `ct_s` encapsulated to `pk_s`
        kem_ciphertext: Vec<u8>,
    },
    /// Responder's AEAD key confirmation
    Confirm(ConfirmPayload),
}

impl HandshakeMessage {
    /// Wire tag of this message
    pub fn tag(&self) -> u8 {
        match self {
            HandshakeMessage::Init { .. } => TAG_INIT,
            HandshakeMessage::ServerHello { .. } => TAG_SERVER_HELLO,
            HandshakeMessage::ClientFinish { .. } => TAG_CLIENT_FINISH,
            HandshakeMessage::Confirm(_) => TAG_CONFIRM,
        }
    }

    /// Human-readable message name, for errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            HandshakeMessage::Init { .. } => "Init",
            HandshakeMessage::ServerHello { .. } => "ServerHello",
            HandshakeMessage::ClientFinish { .. } => "ClientFinish",
            HandshakeMessage::Confirm(_) => "Confirm",
        }
    }

    /// Encode this message as a frame payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.tag());
        match self {
            HandshakeMessage::Init {
                ephemeral_public_key,
            } => {
                put_field(&mut out, ephemeral_public_key);
            }
            HandshakeMessage::ServerHello {
                kem_ciphertext,
                static_public_key,
                certificate,
            } => {
                put_field(&mut out, kem_ciphertext);
                put_field(&mut out, static_public_key);
                put_field(&mut out, certificate);
            }
            HandshakeMessage::ClientFinish { kem_ciphertext } => {
                put_field(&mut out, kem_ciphertext);
            }
            HandshakeMessage::Confirm(payload) => {
                out.extend_from_slice(&payload.nonce);
                put_field(&mut out, &payload.ciphertext);
                out.extend_from_slice(&payload.tag);
            }
        }
        out
    }

    /// Decode a frame payload into a handshake message.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let Some((&tag, mut rest)) = data.split_first() else {
            return protocol_err("empty handshake message");
        };

        let message = match tag {
            TAG_INIT => HandshakeMessage::Init {
                ephemeral_public_key: take_field(&mut rest)?,
            },
            TAG_SERVER_HELLO => HandshakeMessage::ServerHello {
                kem_ciphertext: take_field(&mut rest)?,
                static_public_key: take_field(&mut rest)?,
                certificate: take_field(&mut rest)?,
            },
            TAG_CLIENT_FINISH => HandshakeMessage::ClientFinish {
                kem_ciphertext: take_field(&mut rest)?,
            },
            TAG_CONFIRM => {
                let nonce = take_array::<{ chacha::NONCE_SIZE }>(&mut rest)?;
                let ciphertext = take_field(&mut rest)?;
                let tag = take_array::<{ chacha::TAG_SIZE }>(&mut rest)?;
                HandshakeMessage::Confirm(ConfirmPayload {
                    nonce,
                    ciphertext,
                    tag,
                })
            }
            other => {
                return protocol_err(format!("unknown handshake message tag {}", other));
            }
        };

        if !rest.is_empty() {
            return protocol_err(format!(
                "{} trailing bytes after {} message",
                rest.len(),
                message.name()
            ));
        }
        Ok(message)
    }
}

fn put_field(out: &mut Vec<u8>, field: &[u8]) {
    let mut prefix = [0u8; 4];
    BigEndian::write_u32(&mut prefix, field.len() as u32);
    out.extend_from_slice(&prefix);
    out.extend_from_slice(field);
}

fn take_field(rest: &mut &[u8]) -> Result<Vec<u8>> {
    if rest.len() < 4 {
        return protocol_err("truncated handshake field length");
    }
    let len = BigEndian::read_u32(&rest[..4]) as usize;
    *rest = &rest[4..];
    if rest.len() < len {
        return protocol_err("truncated handshake field");
    }
    let (field, tail) = rest.split_at(len);
    *rest = tail;
    Ok(field.to_vec())
}

fn take_array<const N: usize>(rest: &mut &[u8]) -> Result<[u8; N]> {
    if rest.len() < N {
        return protocol_err("truncated handshake field");
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&rest[..N]);
    *rest = &rest[N..];
    Ok(out)
}
