//! Protocol lifecycle states

use thiserror::Error;

/// Where the session stands with the server
///
/// `Disconnected -> AwaitingLogin` on attach, `AwaitingLogin -> Synced` on
/// the first non-login push, and back to `Disconnected` on detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolState {
    #[default]
    Disconnected,
    AwaitingLogin,
    Synced,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unexpected transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: ProtocolState,
    pub to: ProtocolState,
}

impl ProtocolState {
    /// Check that `next` follows from `self`
    pub fn check(self, next: ProtocolState) -> Result<(), TransitionError> {
        use ProtocolState::*;
        match (self, next) {
            (Disconnected, AwaitingLogin)
            | (AwaitingLogin, Synced)
            | (Synced, Synced)
            | (_, Disconnected) => Ok(()),
            (from, to) => Err(TransitionError { from, to }),
        }
    }

    pub fn is_synced(self) -> bool {
        self == ProtocolState::Synced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        assert!(ProtocolState::Disconnected.check(ProtocolState::AwaitingLogin).is_ok());
        assert!(ProtocolState::AwaitingLogin.check(ProtocolState::Synced).is_ok());
        assert!(ProtocolState::Synced.check(ProtocolState::Disconnected).is_ok());
    }

    #[test]
    fn test_reattach_while_synced_is_flagged() {
        let err = ProtocolState::Synced.check(ProtocolState::AwaitingLogin).unwrap_err();
        assert_eq!(err.from, ProtocolState::Synced);
        assert_eq!(err.to, ProtocolState::AwaitingLogin);
    }
}
