//! Handshake phase machine

use crate::{Error, Result};

/// Phase of the connection handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Stream open, nothing sent yet
    Initial,

    /// SSLRequest sent, awaiting S/N response
    NegotiatingTls,

    /// Startup sent; receiving backend key data and authentication requests
    AwaitingAuth,

    /// ReadyForQuery received; the session is usable
    Ready,

    /// The handshake was aborted
    Failed,
}

impl HandshakePhase {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: HandshakePhase) -> bool {
        use HandshakePhase::*;

        matches!(
            (self, next),
            (Initial, NegotiatingTls)
                | (Initial, AwaitingAuth)
                | (NegotiatingTls, AwaitingAuth)
                | (AwaitingAuth, Ready)
                | (Initial | NegotiatingTls | AwaitingAuth, Failed)
        )
    }

    /// Transition to new phase
    pub fn transition(&mut self, next: HandshakePhase) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {}", self),
                actual: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::NegotiatingTls => write!(f, "negotiating_tls"),
            Self::AwaitingAuth => write!(f, "awaiting_auth"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut phase = HandshakePhase::Initial;
        assert!(phase.transition(HandshakePhase::AwaitingAuth).is_ok());
        assert!(phase.transition(HandshakePhase::Ready).is_ok());
        assert_eq!(phase, HandshakePhase::Ready);
        assert!(!phase.can_transition_to(HandshakePhase::Failed));
    }

    #[test]
    fn test_invalid_transition() {
        let mut phase = HandshakePhase::Initial;
        assert!(phase.transition(HandshakePhase::Ready).is_err());
        assert_eq!(phase, HandshakePhase::Initial);
    }

    #[test]
    fn test_tls_negotiation_transitions() {
        let mut phase = HandshakePhase::Initial;
        assert!(phase.transition(HandshakePhase::NegotiatingTls).is_ok());
        assert!(phase.transition(HandshakePhase::AwaitingAuth).is_ok());
    }

    #[test]
    fn test_fail_from_any_open_phase() {
        for start in [
            HandshakePhase::Initial,
            HandshakePhase::NegotiatingTls,
            HandshakePhase::AwaitingAuth,
        ] {
            let mut phase = start;
            assert!(phase.transition(HandshakePhase::Failed).is_ok());
        }
    }

    #[test]
    fn test_terminal_phases_are_final() {
        let mut phase = HandshakePhase::Ready;
        assert!(phase.transition(HandshakePhase::Failed).is_err());

        let mut phase = HandshakePhase::Failed;
        assert!(phase.transition(HandshakePhase::AwaitingAuth).is_err());
    }

    #[test]
    fn test_invalid_tls_transition() {
        let mut phase = HandshakePhase::AwaitingAuth;
        assert!(phase.transition(HandshakePhase::NegotiatingTls).is_err());
    }
}
