//! Session types: configuration, secrets, and what a request check yields.

use std::fmt;

use latchkey_token::{Claims, SealedCookie, UserId};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Cookie names, lifetimes and attributes for the session pair.
///
/// Every field has a default, so a partial config file is enough:
///
/// ```
/// # use latchkey_session::SessionConfig;
/// let config = SessionConfig {
///     access_ttl_secs: 60,
///     ..Default::default()
/// };
/// assert_eq!(config.refresh_ttl_secs, 604_800);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the short-lived cookie.
    pub access_cookie_name: String,

    /// Name of the long-lived cookie.
    pub refresh_cookie_name: String,

    /// Access token lifetime. Default: 300 seconds.
    pub access_ttl_secs: u64,

    /// Refresh token lifetime. Default: 604800 seconds (7 days).
    pub refresh_ttl_secs: u64,

    /// Sets the `Secure` attribute on both cookies.
    pub secure: bool,

    /// `Path` attribute on both cookies.
    pub cookie_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_cookie_name: "access_token".to_string(),
            refresh_cookie_name: "refresh_token".to_string(),
            access_ttl_secs: 300,
            refresh_ttl_secs: 604_800,
            secure: true,
            cookie_path: "/".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// The four independent signing secrets.
///
/// Each must be at least 32 bytes; that is checked once, when the
/// components that use them are constructed.
#[derive(Clone, Deserialize)]
pub struct Secrets {
    /// Signs access tokens.
    pub access: String,
    /// Signs refresh tokens.
    pub refresh: String,
    /// Signs the outer `token:signature` layer of both cookies.
    pub cookie: String,
    /// Signs channel handshake tokens.
    pub handshake: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SessionPair / AuthOutcome
// ---------------------------------------------------------------------------

/// The two sealed cookie values written on login or rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPair {
    pub access: SealedCookie,
    pub refresh: SealedCookie,
}

/// Result of checking one request's cookies.
///
/// ```text
///   access valid ───────────────────────────→ Authenticated
///   access bad, refresh valid ──(rotate)────→ Refreshed
///   access bad, refresh bad/missing ────────→ Unauthenticated
/// ```
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// The access cookie was good. No cookie was written.
    Authenticated { claims: Claims },

    /// The access cookie was missing or bad but the refresh cookie was
    /// good: a brand-new pair was written. `claims` are the refresh
    /// token's, which carry the identity forward.
    Refreshed { claims: Claims },

    /// Neither cookie established an identity. No cookie was written.
    Unauthenticated { reason: String },
}

impl AuthOutcome {
    /// Returns `true` for [`Authenticated`](Self::Authenticated) and
    /// [`Refreshed`](Self::Refreshed).
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated { .. })
    }

    /// The claims that established the identity, if any.
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Authenticated { claims } | Self::Refreshed { claims } => Some(claims),
            Self::Unauthenticated { .. } => None,
        }
    }

    /// The `userId` claim, if authenticated.
    pub fn user_id(&self) -> Option<UserId> {
        self.claims().and_then(Claims::user_id)
    }
}
