//! Both integrity layers behind one type.
//!
//! Session code never handles a bare [`Token`] from a cookie. It goes
//! through [`SealedTokenCodec`], which always checks the outer cookie
//! signature first and the inner token signature second, and reports
//! which layer failed.

use crate::{ClaimSet, Claims, CookieSigner, SealedCookie, Token, TokenCodec, TokenError};

/// A [`TokenCodec`] paired with a [`CookieSigner`].
///
/// The access and refresh cookies each get one of these: different token
/// secrets, same cookie signer.
#[derive(Debug, Clone)]
pub struct SealedTokenCodec {
    tokens: TokenCodec,
    cookies: CookieSigner,
}

impl SealedTokenCodec {
    /// Pairs a token codec with a cookie signer.
    pub fn new(tokens: TokenCodec, cookies: CookieSigner) -> Self {
        Self { tokens, cookies }
    }

    /// Mints a token for `claims` and seals it.
    ///
    /// # Errors
    /// Propagates [`TokenError::Encode`].
    pub fn issue(&self, claims: &ClaimSet, ttl_secs: u64) -> Result<SealedCookie, TokenError> {
        let token = self.tokens.encode(claims, ttl_secs)?;
        Ok(self.cookies.seal(&token))
    }

    /// Opens a cookie value and returns its live claims.
    ///
    /// # Errors
    /// - [`TokenError::CookieInvalid`] if the outer signature fails
    /// - [`TokenError::Invalid`] if the inner token fails
    /// - [`TokenError::Expired`] if the inner token has expired
    pub fn unseal(&self, cookie: &str) -> Result<Claims, TokenError> {
        let token = self.open(cookie)?;
        self.tokens.verify(token.as_str())
    }

    /// Strips the outer signature without checking the inner token.
    ///
    /// # Errors
    /// Returns [`TokenError::CookieInvalid`] on an outer-signature failure.
    pub fn open(&self, cookie: &str) -> Result<Token, TokenError> {
        self.cookies.open(cookie)
    }

    /// The inner codec.
    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }
}
