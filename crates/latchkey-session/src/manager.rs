//! The session manager: the access/refresh cookie state machine.
//!
//! Every request is checked in the same order:
//!
//! ```text
//!               ┌──────────────────────┐
//!   request ──→ │ access cookie valid? │──yes──→ Authenticated (no writes)
//!               └──────────┬───────────┘
//!                          no
//!                          ▼
//!               ┌───────────────────────┐
//!               │ refresh cookie valid? │──yes──→ mint + seal both,
//!               └──────────┬────────────┘         write both → Refreshed
//!                          no
//!                          ▼
//!                  Unauthenticated (no writes)
//! ```
//!
//! The manager holds no per-user state. Secrets are fixed at construction,
//! so concurrent requests for the same user rotate independently and
//! never need a lock.

use std::sync::Arc;

use cookie::Cookie;
use latchkey_token::{
    ClaimSet, Clock, CookieSigner, SealBinding, SealedCookie, SealedTokenCodec, SignatureService,
    TokenCodec, TokenError,
};

use crate::{AuthOutcome, CookieExchange, Secrets, SessionConfig, SessionError, SessionPair};

/// Issues, validates, rotates and clears the session cookie pair.
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: SessionConfig,
    access: SealedTokenCodec,
    refresh: SealedTokenCodec,
}

impl SessionManager {
    /// Builds a manager with the default outer-cookie binding.
    ///
    /// # Errors
    /// Returns [`SessionError::Token`] wrapping [`TokenError::WeakSecret`]
    /// if any of the access, refresh or cookie secrets is too short, and
    /// [`SessionError::InvalidConfig`] if a TTL is zero or the access
    /// cookie would outlive the refresh cookie.
    pub fn new(
        config: SessionConfig,
        secrets: &Secrets,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        Self::with_seal_binding(config, secrets, clock, SealBinding::default())
    }

    /// Builds a manager whose outer cookie signature uses `binding`.
    pub fn with_seal_binding(
        config: SessionConfig,
        secrets: &Secrets,
        clock: Arc<dyn Clock>,
        binding: SealBinding,
    ) -> Result<Self, SessionError> {
        validate_lifetimes(&config)?;
        let cookies = CookieSigner::with_binding(SignatureService::new(&secrets.cookie)?, binding);
        let access = SealedTokenCodec::new(
            TokenCodec::new(SignatureService::new(&secrets.access)?, clock.clone()),
            cookies.clone(),
        );
        let refresh = SealedTokenCodec::new(
            TokenCodec::new(SignatureService::new(&secrets.refresh)?, clock),
            cookies,
        );
        Ok(Self {
            config,
            access,
            refresh,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issues a fresh pair for `claims` and writes both cookies.
    ///
    /// Both tokens are minted from the same base claims; the access one
    /// with the short lifetime, the refresh one with the long lifetime.
    ///
    /// # Errors
    /// Propagates [`TokenError::Encode`]; nothing is written in that case.
    pub fn login<X>(&self, claims: &ClaimSet, exchange: &mut X) -> Result<SessionPair, SessionError>
    where
        X: CookieExchange + ?Sized,
    {
        let pair = self.issue_pair(claims)?;
        self.write_pair(&pair, exchange);
        tracing::info!(user_id = ?claims.get("userId"), "session issued");
        Ok(pair)
    }

    /// Checks the request's cookies and rotates the pair if needed.
    ///
    /// Never fails: every cryptographic or structural problem with the
    /// cookies ends up as [`AuthOutcome::Unauthenticated`].
    pub fn authenticate<X>(&self, exchange: &mut X) -> AuthOutcome
    where
        X: CookieExchange + ?Sized,
    {
        let access_failure = match exchange.request_cookie(&self.config.access_cookie_name) {
            None => "access cookie missing".to_string(),
            Some(value) => match self.access.unseal(value) {
                Ok(claims) => {
                    tracing::debug!(user_id = ?claims.user_id(), "access cookie accepted");
                    return AuthOutcome::Authenticated { claims };
                }
                Err(e) => format!("access: {e}"),
            },
        };

        let refresh_result = match exchange.request_cookie(&self.config.refresh_cookie_name) {
            None => Err("refresh cookie missing".to_string()),
            Some(value) => self.refresh.unseal(value).map_err(|e| format!("refresh: {e}")),
        };
        let claims = match refresh_result {
            Ok(claims) => claims,
            Err(refresh_failure) => {
                let reason = format!("{access_failure}; {refresh_failure}");
                tracing::debug!(%reason, "request unauthenticated");
                return AuthOutcome::Unauthenticated { reason };
            }
        };

        // Both seals happen before either write, so a failure leaves the
        // response untouched.
        match self.issue_pair(&claims.set()) {
            Ok(pair) => {
                self.write_pair(&pair, exchange);
                tracing::info!(user_id = ?claims.user_id(), "session rotated");
                AuthOutcome::Refreshed { claims }
            }
            Err(e) => {
                tracing::warn!(error = %e, "session rotation failed");
                AuthOutcome::Unauthenticated {
                    reason: format!("rotation failed: {e}"),
                }
            }
        }
    }

    /// Clears both cookies. Succeeds whether or not they were present.
    pub fn logout<X>(&self, exchange: &mut X)
    where
        X: CookieExchange + ?Sized,
    {
        exchange.set_cookie(self.cleared_cookie(&self.config.access_cookie_name));
        exchange.set_cookie(self.cleared_cookie(&self.config.refresh_cookie_name));
        tracing::info!("session cleared");
    }

    fn issue_pair(&self, claims: &ClaimSet) -> Result<SessionPair, TokenError> {
        Ok(SessionPair {
            access: self.access.issue(claims, self.config.access_ttl_secs)?,
            refresh: self.refresh.issue(claims, self.config.refresh_ttl_secs)?,
        })
    }

    fn write_pair<X>(&self, pair: &SessionPair, exchange: &mut X)
    where
        X: CookieExchange + ?Sized,
    {
        exchange.set_cookie(self.session_cookie(
            &self.config.access_cookie_name,
            &pair.access,
            self.config.access_ttl_secs,
        ));
        exchange.set_cookie(self.session_cookie(
            &self.config.refresh_cookie_name,
            &pair.refresh,
            self.config.refresh_ttl_secs,
        ));
    }

    fn session_cookie(&self, name: &str, value: &SealedCookie, ttl_secs: u64) -> Cookie<'static> {
        let max_age = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Cookie::build((name.to_string(), value.as_str().to_string()))
            .http_only(true)
            .secure(self.config.secure)
            .path(self.config.cookie_path.clone())
            .max_age(time::Duration::seconds(max_age))
            .build()
    }

    fn cleared_cookie(&self, name: &str) -> Cookie<'static> {
        Cookie::build((name.to_string(), String::new()))
            .http_only(true)
            .secure(self.config.secure)
            .path(self.config.cookie_path.clone())
            .max_age(time::Duration::ZERO)
            .build()
    }
}

// =========================================================================
// Tests
// =========================================================================

/// Every pair must expire access-first.
fn validate_lifetimes(config: &SessionConfig) -> Result<(), SessionError> {
    if config.access_ttl_secs == 0 || config.refresh_ttl_secs == 0 {
        return Err(SessionError::InvalidConfig("cookie TTLs must be positive".into()));
    }
    if config.access_ttl_secs > config.refresh_ttl_secs {
        return Err(SessionError::InvalidConfig(format!(
            "access TTL {}s exceeds refresh TTL {}s",
            config.access_ttl_secs, config.refresh_ttl_secs
        )));
    }
    Ok(())
}
