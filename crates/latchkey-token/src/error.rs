//! Error types for the token layer.
//!
//! Each crate in Latchkey defines its own error enum. A `TokenError`
//! always means something went wrong while signing, encoding, or
//! verifying a token, never a network or registry problem.

/// Errors that can occur in the token layer.
///
/// The variants map one-to-one onto the failure kinds callers need to
/// tell apart: a bad secret is a startup bug, an invalid token or cookie
/// means tampering or corruption, and an expired token may still be
/// recoverable through a refresh.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The secret handed to a [`SignatureService`](crate::SignatureService)
    /// is empty or too short. Raised once, at construction time.
    #[error("secret too short: {len} bytes, need at least {min}")]
    WeakSecret { len: usize, min: usize },

    /// The token is malformed or its signature does not verify.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The token verified but its `exp` instant has passed.
    ///
    /// Kept separate from [`Invalid`](Self::Invalid) so callers can
    /// distinguish "tampered" from "stale".
    #[error("token expired")]
    Expired,

    /// The sealed cookie value is malformed or its outer signature
    /// does not match.
    #[error("invalid cookie: {0}")]
    CookieInvalid(String),

    /// Claims could not be serialized into a token payload.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TokenError {
    /// Returns `true` for the expired case only.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_secret_display_mentions_lengths() {
        let err = TokenError::WeakSecret { len: 3, min: 32 };
        assert_eq!(err.to_string(), "secret too short: 3 bytes, need at least 32");
    }

    #[test]
    fn test_is_expired_only_for_expired_variant() {
        assert!(TokenError::Expired.is_expired());
        assert!(!TokenError::Invalid("bad".into()).is_expired());
        assert!(!TokenError::CookieInvalid("bad".into()).is_expired());
    }
}
