/*!
Asynchronous handshake drivers.

One function per role runs the full four-message exchange over any
ordered byte stream and reports the outcome as a `Result`: the session
key on success, the failure otherwise. Every wait for an expected
message carries a deadline; a silent peer fails the handshake with
`Error::Timeout` instead of blocking the task forever.

The drivers share the caller's `FrameDecoder` so that bytes buffered
during the handshake are not lost when the connection switches to
application framing.
*/

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

use crate::config::ChannelConfig;
use crate::constants::{CERTIFICATE_PLACEHOLDER, CONFIRMATION_PLAINTEXT};
use crate::crypto::aead::ConfirmationCipher;
use crate::crypto::kdf::{SessionKey, derive_key_set};
use crate::crypto::kem::Kem;
use crate::error::{AuthError, Error, Result};
use crate::framing::{FrameDecoder, encode_frame};
use crate::handshake::message::HandshakeMessage;
use crate::handshake::state::HandshakeState;
use crate::identity::ServerIdentity;

/// Run the initiator role to completion.
///
/// Generates an ephemeral keypair, exchanges the four handshake
/// messages, and verifies the responder's key confirmation. Any error
/// is fatal to this connection attempt; the caller releases the
/// transport.
pub async fn initiate<S, K>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    kem: &K,
    config: &ChannelConfig,
) -> Result<SessionKey>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: Kem + ?Sized,
{
    let mut state = HandshakeState::Init;
    let result = run_initiator(stream, decoder, kem, config, &mut state).await;
    if result.is_err() {
        let _ = state.advance(HandshakeState::Failed);
    }
    result
}

/// Run the responder role to completion.
///
/// Uses the process-wide [`ServerIdentity`]; the static keypair is
/// referenced, never regenerated per connection.
pub async fn respond<S, K>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    kem: &K,
    identity: &ServerIdentity,
    config: &ChannelConfig,
) -> Result<SessionKey>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: Kem + ?Sized,
{
    let mut state = HandshakeState::Init;
    let result = run_responder(stream, decoder, kem, identity, config, &mut state).await;
    if result.is_err() {
        let _ = state.advance(HandshakeState::Failed);
    }
    result
}

async fn run_initiator<S, K>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    kem: &K,
    config: &ChannelConfig,
    state: &mut HandshakeState,
) -> Result<SessionKey>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: Kem + ?Sized,
{
    let (pk_e, sk_e) = kem.generate_keypair()?;
    send_message(
        stream,
        &HandshakeMessage::Init {
            ephemeral_public_key: pk_e,
        },
    )
    .await?;
    state.advance(HandshakeState::AwaitingPeer1)?;
    debug!("initiator sent Init, awaiting ServerHello");

    let (ct_e, pk_s) = match recv_message(stream, decoder, config).await? {
        HandshakeMessage::ServerHello {
            kem_ciphertext,
            static_public_key,
            certificate: _,
        } => (kem_ciphertext, static_public_key),
        other => return Err(unexpected("ServerHello", &other)),
    };

    // Placeholder certificate verification: a non-empty identity key is
    // accepted. This is explicitly simulated and not a trust check.
    if pk_s.is_empty() {
        return Err(Error::Authentication(AuthError::EmptyCertificateKey));
    }

    let ss_e = kem.decapsulate(&ct_e, &sk_e)?;
    let (ss_s, ct_s) = kem.encapsulate(&pk_s)?;
    send_message(
        stream,
        &HandshakeMessage::ClientFinish {
            kem_ciphertext: ct_s,
        },
    )
    .await?;
    state.advance(HandshakeState::AwaitingPeer2)?;

    // Fixed concatenation order; must match the responder byte for byte
    let key_set = derive_key_set(&ss_e, &ss_s)?;
    state.advance(HandshakeState::Confirming)?;
    debug!("initiator derived keys, awaiting Confirm");

    let payload = match recv_message(stream, decoder, config).await? {
        HandshakeMessage::Confirm(payload) => payload,
        other => return Err(unexpected("Confirm", &other)),
    };

    let cipher = ConfirmationCipher::new(&key_set.confirmation_key);
    let plaintext = cipher.open(&payload)?;
    if plaintext != CONFIRMATION_PLAINTEXT {
        return Err(Error::Authentication(AuthError::ConfirmationMismatch));
    }

    state.advance(HandshakeState::Established)?;
    debug!("initiator handshake established");
    Ok(key_set.session_key)
}

async fn run_responder<S, K>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    kem: &K,
    identity: &ServerIdentity,
    config: &ChannelConfig,
    state: &mut HandshakeState,
) -> Result<SessionKey>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: Kem + ?Sized,
{
    state.advance(HandshakeState::AwaitingPeer1)?;
    debug!("responder awaiting Init");

    let pk_e = match recv_message(stream, decoder, config).await? {
        HandshakeMessage::Init {
            ephemeral_public_key,
        } => ephemeral_public_key,
        other => return Err(unexpected("Init", &other)),
    };

    let (ss_e, ct_e) = kem.encapsulate(&pk_e)?;
    send_message(
        stream,
        &HandshakeMessage::ServerHello {
            kem_ciphertext: ct_e,
            static_public_key: identity.public_key().to_vec(),
            certificate: CERTIFICATE_PLACEHOLDER.to_vec(),
        },
    )
    .await?;
    state.advance(HandshakeState::AwaitingPeer2)?;
    debug!("responder sent ServerHello, awaiting ClientFinish");

    let ct_s = match recv_message(stream, decoder, config).await? {
        HandshakeMessage::ClientFinish { kem_ciphertext } => kem_ciphertext,
        other => return Err(unexpected("ClientFinish", &other)),
    };

    let ss_s = kem.decapsulate(&ct_s, identity.secret_key())?;
    let key_set = derive_key_set(&ss_e, &ss_s)?;
    state.advance(HandshakeState::Confirming)?;

    let cipher = ConfirmationCipher::new(&key_set.confirmation_key);
    let payload = cipher.seal(CONFIRMATION_PLAINTEXT)?;
    send_message(stream, &HandshakeMessage::Confirm(payload)).await?;

    state.advance(HandshakeState::Established)?;
    debug!("responder handshake established");
    Ok(key_set.session_key)
}

fn unexpected(expected: &str, got: &HandshakeMessage) -> Error {
    Error::Protocol(format!(
        "expected {} but received {}",
        expected,
        got.name()
    ))
}

async fn send_message<S>(stream: &mut S, message: &HandshakeMessage) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let frame = encode_frame(&message.encode());
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

async fn recv_message<S>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    config: &ChannelConfig,
) -> Result<HandshakeMessage>
where
    S: AsyncRead + Unpin,
{
    let wait = async {
        loop {
            if let Some(payload) = decoder.next_frame()? {
                return HandshakeMessage::decode(&payload);
            }
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection mid-handshake",
                )));
            }
            decoder.extend(&buf[..n]);
        }
    };

    match timeout(config.step_timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(config.step_timeout.as_millis() as u64)),
    }
}
