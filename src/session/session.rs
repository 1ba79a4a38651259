/*!
One established secure channel to a peer.

A `Session` is created only after a successful handshake and is owned by
the registry for its whole life. Its status moves strictly forward and a
closed session is removed rather than reused.
*/

use std::fmt;
use std::sync::Mutex as StdMutex;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::crypto::kdf::SessionKey;
use crate::error::{Result, invalid_state_err};
use crate::framing::encode_frame;
use crate::handshake::state::Role;

/// Lifecycle of a session, ordered; transitions are forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    /// Transport connect/accept in progress
    Connecting,
    /// Handshake in flight
    Handshaking,
    /// Session key negotiated, application frames flowing
    Established,
    /// Transport released; the session is removed and never reused
    Closed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Connecting => write!(f, "Connecting"),
            SessionStatus::Handshaking => write!(f, "Handshaking"),
            SessionStatus::Established => write!(f, "Established"),
            SessionStatus::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionStatus {
    /// Advance to the next status, rejecting backward moves.
    pub fn advance(&mut self, next: SessionStatus) -> Result<()> {
        if next <= *self {
            return invalid_state_err(next, *self);
        }
        *self = next;
        Ok(())
    }
}

/// State of one established secure channel.
///
/// Only sessions that completed the handshake are ever constructed; a
/// failed handshake leaves no `Session` behind.
pub struct Session {
    peer_id: String,
    role: Role,
    key: SessionKey,
    writer: Mutex<OwnedWriteHalf>,
    status: StdMutex<SessionStatus>,
}

impl Session {
    /// Wrap a freshly established connection.
    pub(crate) fn established(
        peer_id: String,
        role: Role,
        key: SessionKey,
        writer: OwnedWriteHalf,
    ) -> Self {
        Self {
            peer_id,
            role,
            key,
            writer: Mutex::new(writer),
            status: StdMutex::new(SessionStatus::Established),
        }
    }

    /// Peer identifier this session is keyed by
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Role this endpoint played in the handshake
    pub fn role(&self) -> Role {
        self.role
    }

    /// The negotiated session key
    pub fn session_key(&self) -> SessionKey {
        self.key.clone()
    }

    /// Current lifecycle status
    pub fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap()
    }

    /// Whether the session can still carry traffic
    pub fn is_live(&self) -> bool {
        self.status() != SessionStatus::Closed
    }

    /// Mark the session closed. Idempotent.
    pub(crate) fn mark_closed(&self) {
        let mut status = self.status.lock().unwrap();
        let _ = status.advance(SessionStatus::Closed);
    }

    /// Frame-encode a payload and write it to the transport.
    ///
    /// Resolves once the write has flushed.
    pub(crate) async fn write_frame(&self, payload: &[u8]) -> Result<()> {
        if !self.is_live() {
            return invalid_state_err(SessionStatus::Established, self.status());
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(&encode_frame(payload)).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_moves_forward_only() {
        let mut status = SessionStatus::Connecting;
        status.advance(SessionStatus::Handshaking).unwrap();
        status.advance(SessionStatus::Established).unwrap();
        status.advance(SessionStatus::Closed).unwrap();

        // No reopening and no self-transition
        assert!(status.advance(SessionStatus::Established).is_err());
        assert!(status.advance(SessionStatus::Closed).is_err());
    }

    #[test]
    fn test_status_cannot_skip_backwards() {
        let mut status = SessionStatus::Established;
        assert!(status.advance(SessionStatus::Connecting).is_err());
        assert_eq!(status, SessionStatus::Established);
    }
}
