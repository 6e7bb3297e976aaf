//! The outer cookie signature.
//!
//! A session cookie's value is `token:signature`, where `signature` is an
//! HMAC under the *cookie* secret, independent of the secret that signed
//! the token itself. A forged cookie has to beat both.

use crate::{SealedCookie, SignatureService, Token, TokenError};

/// Separator between the token and its outer signature.
const SEPARATOR: char = ':';

/// What the outer signature covers.
///
/// The long-standing cookie format signs `token + ":" + secret`, mixing
/// the raw secret into the signed bytes on top of using it as the HMAC
/// key. That is kept as the default so existing cookies stay valid.
/// [`TokenOnly`](Self::TokenOnly) signs just the token; cookies sealed
/// under one binding do not open under the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SealBinding {
    /// Sign `token:secret`.
    #[default]
    SecretContext,
    /// Sign `token`.
    TokenOnly,
}

/// Seals tokens into cookie values and opens them again.
#[derive(Debug, Clone)]
pub struct CookieSigner {
    signer: SignatureService,
    binding: SealBinding,
}

impl CookieSigner {
    /// Creates a signer using the default [`SealBinding`].
    pub fn new(signer: SignatureService) -> Self {
        Self::with_binding(signer, SealBinding::default())
    }

    /// Creates a signer with an explicit binding.
    pub fn with_binding(signer: SignatureService, binding: SealBinding) -> Self {
        Self { signer, binding }
    }

    /// Returns `token:signature`.
    pub fn seal(&self, token: &Token) -> SealedCookie {
        let signature = self.signer.sign(&self.signed_bytes(token.as_str()));
        SealedCookie(format!("{}{SEPARATOR}{signature}", token.as_str()))
    }

    /// Verifies and strips the outer signature.
    ///
    /// # Errors
    /// Returns [`TokenError::CookieInvalid`] if the value doesn't split into
    /// exactly two non-empty parts or the signature doesn't match.
    pub fn open(&self, cookie: &str) -> Result<Token, TokenError> {
        let mut parts = cookie.split(SEPARATOR);
        let (Some(token), Some(signature), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::CookieInvalid("expected token:signature".into()));
        };
        if token.is_empty() || signature.is_empty() {
            return Err(TokenError::CookieInvalid("empty segment".into()));
        }

        if !self.signer.verify(&self.signed_bytes(token), signature) {
            return Err(TokenError::CookieInvalid("signature mismatch".into()));
        }

        Ok(Token(token.to_string()))
    }

    fn signed_bytes(&self, token: &str) -> Vec<u8> {
        match self.binding {
            SealBinding::TokenOnly => token.as_bytes().to_vec(),
            SealBinding::SecretContext => {
                let secret = self.signer.secret();
                let mut data = Vec::with_capacity(token.len() + 1 + secret.len());
                data.extend_from_slice(token.as_bytes());
                data.push(SEPARATOR as u8);
                data.extend_from_slice(secret);
                data
            }
        }
    }
}
