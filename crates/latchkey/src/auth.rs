//! Login, logout and per-request guarding over a credential store.
//!
//! [`AuthService`] is what HTTP handlers call. It is framework-agnostic:
//! the request and response are reached through a [`CookieExchange`].

use latchkey_session::{
    AuthOutcome, CookieExchange, CredentialStore, HandshakeAuthorizer, PasswordVerifier,
    SessionError, SessionManager,
};
use latchkey_token::{ClaimSet, Token, UserId};
use serde::Serialize;

use crate::LatchkeyError;

/// What a successful login returns to the client, besides the cookies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Short-lived token for opening a channel right away.
    pub handshake_token: String,
}

/// Credential login plus the session and handshake operations built on it.
pub struct AuthService<S, V> {
    sessions: SessionManager,
    handshakes: HandshakeAuthorizer,
    store: S,
    verifier: V,
}

impl<S, V> AuthService<S, V>
where
    S: CredentialStore,
    V: PasswordVerifier,
{
    pub fn new(sessions: SessionManager, handshakes: HandshakeAuthorizer, store: S, verifier: V) -> Self {
        Self {
            sessions,
            handshakes,
            store,
            verifier,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Checks an email/password pair and starts a session.
    ///
    /// The email is trimmed and lowercased before lookup. Exactly one
    /// record must match and the password must verify against it; on
    /// success both session cookies are written and a handshake token is
    /// returned.
    ///
    /// # Errors
    /// - [`SessionError::InvalidCredentials`] for an unknown email, an
    ///   ambiguous email, or a wrong password
    /// - [`SessionError::CredentialLookup`] if the store fails
    pub async fn login<X>(
        &self,
        email: &str,
        password: &str,
        exchange: &mut X,
    ) -> Result<LoginResponse, LatchkeyError>
    where
        X: CookieExchange + ?Sized,
    {
        let email = email.trim().to_lowercase();
        let records = self.store.find_by_email(&email).await?;

        let [record] = records.as_slice() else {
            tracing::info!(matches = records.len(), "login rejected: no unique account");
            return Err(SessionError::InvalidCredentials.into());
        };
        if !self.verifier.verify(password, &record.password_hash) {
            tracing::info!(user_id = %record.user_id, "login rejected: bad password");
            return Err(SessionError::InvalidCredentials.into());
        }

        let claims = ClaimSet::new()
            .with("userId", record.user_id.as_str())
            .with("email", record.email.as_str())
            .with("firstName", record.first_name.as_str())
            .with("lastName", record.last_name.as_str());
        self.sessions.login(&claims, exchange)?;
        let handshake_token = self.handshakes.issue(&record.user_id)?;

        tracing::info!(user_id = %record.user_id, "login succeeded");
        Ok(LoginResponse {
            user_id: record.user_id.clone(),
            email: record.email.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            handshake_token: handshake_token.into_string(),
        })
    }

    /// Clears the session cookies. Always succeeds.
    pub fn logout<X>(&self, exchange: &mut X)
    where
        X: CookieExchange + ?Sized,
    {
        self.sessions.logout(exchange);
    }

    /// Runs the session state machine for one request.
    pub fn guard<X>(&self, exchange: &mut X) -> AuthOutcome
    where
        X: CookieExchange + ?Sized,
    {
        self.sessions.authenticate(exchange)
    }

    /// Like [`guard`](Self::guard), but returns the caller's identity or
    /// [`SessionError::Unauthenticated`].
    pub fn require<X>(&self, exchange: &mut X) -> Result<UserId, LatchkeyError>
    where
        X: CookieExchange + ?Sized,
    {
        match self.guard(exchange) {
            AuthOutcome::Unauthenticated { reason } => {
                Err(SessionError::Unauthenticated(reason).into())
            }
            outcome => outcome
                .user_id()
                .ok_or_else(|| SessionError::Unauthenticated("session names no user".into()).into()),
        }
    }

    /// Mints a fresh handshake token for the session's user.
    ///
    /// Goes through the full guard, so an expired access cookie with a good
    /// refresh cookie still works (and rotates the pair).
    pub fn refresh_handshake_token<X>(&self, exchange: &mut X) -> Result<Token, LatchkeyError>
    where
        X: CookieExchange + ?Sized,
    {
        let user_id = self.require(exchange)?;
        let token = self.handshakes.issue(&user_id)?;
        tracing::debug!(%user_id, "handshake token refreshed");
        Ok(token)
    }
}
