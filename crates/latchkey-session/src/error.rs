//! Error types for the session layer.

use latchkey_token::TokenError;

/// Errors that can occur during session management.
///
/// Per-request cookie failures never show up here: [`SessionManager::authenticate`]
/// folds them into [`AuthOutcome::Unauthenticated`]. What remains are
/// startup failures, login failures and handshake refusals.
///
/// [`SessionManager::authenticate`]: crate::SessionManager::authenticate
/// [`AuthOutcome::Unauthenticated`]: crate::AuthOutcome::Unauthenticated
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A token-layer failure: a weak secret at startup, or an encode
    /// failure while minting.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Neither cookie of the pair could establish an identity.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The channel-open token was missing, invalid, or expired.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Unknown email or wrong password. The two are not distinguished.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The session configuration cannot produce a consistent cookie pair.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// The credential store itself failed.
    #[error("credential lookup failed: {0}")]
    CredentialLookup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_converts_transparently() {
        let err: SessionError = TokenError::Expired.into();
        assert!(matches!(err, SessionError::Token(TokenError::Expired)));
        assert_eq!(err.to_string(), "token expired");
    }

    #[test]
    fn test_invalid_credentials_message_is_generic() {
        assert_eq!(SessionError::InvalidCredentials.to_string(), "invalid credentials");
    }
}
