//! Unified error type for Latchkey.

use latchkey_registry::RegistryError;
use latchkey_session::SessionError;
use latchkey_token::TokenError;
use latchkey_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` lift any layer's error into this one.
#[derive(Debug, thiserror::Error)]
pub enum LatchkeyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A token-level error (weak secret, encode failure).
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A session-level error (login, handshake, unauthenticated).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A registry-level error (no active session, failed delivery).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use latchkey_token::UserId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let latchkey_err: LatchkeyError = err.into();
        assert!(matches!(latchkey_err, LatchkeyError::Transport(_)));
        assert!(latchkey_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_token_error() {
        let latchkey_err: LatchkeyError = TokenError::Expired.into();
        assert!(matches!(latchkey_err, LatchkeyError::Token(_)));
    }

    #[test]
    fn test_from_session_error() {
        let latchkey_err: LatchkeyError = SessionError::InvalidCredentials.into();
        assert!(matches!(latchkey_err, LatchkeyError::Session(_)));
    }

    #[test]
    fn test_from_registry_error() {
        let err = RegistryError::NoActiveSession(UserId::new("7"));
        let latchkey_err: LatchkeyError = err.into();
        assert!(matches!(latchkey_err, LatchkeyError::Registry(_)));
        assert_eq!(latchkey_err.to_string(), "no active session for user U-7");
    }
}
