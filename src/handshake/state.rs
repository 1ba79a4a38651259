/*!
Handshake state machine.

Both roles walk the same five-state progression; `Failed` is reachable
from any non-terminal state. Transitions are strictly forward and any
invalid advance is an error rather than a silent no-op.
*/

use std::fmt;

use crate::error::{Result, invalid_state_err};

/// Role of an endpoint in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Opens the connection and sends `Init`
    Initiator,
    /// Accepts the connection and answers with `ServerHello`
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

/// Progress of one handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeState {
    /// Nothing sent or received yet
    Init,
    /// First outbound message sent, waiting for the peer's first message
    AwaitingPeer1,
    /// Waiting for the peer's second message
    AwaitingPeer2,
    /// Keys derived, confirmation exchange in flight
    Confirming,
    /// Handshake complete, session key reported
    Established,
    /// Handshake aborted; terminal
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Init => write!(f, "Init"),
            HandshakeState::AwaitingPeer1 => write!(f, "AwaitingPeer1"),
            HandshakeState::AwaitingPeer2 => write!(f, "AwaitingPeer2"),
            HandshakeState::Confirming => write!(f, "Confirming"),
            HandshakeState::Established => write!(f, "Established"),
            HandshakeState::Failed => write!(f, "Failed"),
        }
    }
}

impl HandshakeState {
    /// Whether the handshake can still make progress
    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Established | HandshakeState::Failed)
    }

    /// Advance to the next state, enforcing the forward-only order.
    ///
    /// `Failed` is accepted from any non-terminal state.
    pub fn advance(&mut self, next: HandshakeState) -> Result<()> {
        let valid = match next {
            HandshakeState::Failed => !self.is_terminal(),
            _ => !self.is_terminal() && next > *self,
        };
        if !valid {
            return invalid_state_err(next, *self);
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_progression() {
        let mut state = HandshakeState::Init;
        state.advance(HandshakeState::AwaitingPeer1).unwrap();
        state.advance(HandshakeState::AwaitingPeer2).unwrap();
        state.advance(HandshakeState::Confirming).unwrap();
        state.advance(HandshakeState::Established).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_no_backward_transition() {
        let mut state = HandshakeState::Confirming;
        assert!(state.advance(HandshakeState::AwaitingPeer1).is_err());
        assert_eq!(state, HandshakeState::Confirming);
    }

    #[test]
    fn test_failed_from_any_non_terminal() {
        for start in [
            HandshakeState::Init,
            HandshakeState::AwaitingPeer1,
            HandshakeState::AwaitingPeer2,
            HandshakeState::Confirming,
        ] {
            let mut state = start;
            state.advance(HandshakeState::Failed).unwrap();
            assert_eq!(state, HandshakeState::Failed);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut established = HandshakeState::Established;
        assert!(established.advance(HandshakeState::Failed).is_err());

        let mut failed = HandshakeState::Failed;
        assert!(failed.advance(HandshakeState::Established).is_err());
    }
}
