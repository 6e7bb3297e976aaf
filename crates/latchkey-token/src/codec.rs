//! Claims ⇄ signed, expiring token.
//!
//! [`TokenCodec`] produces compact JWS tokens (HS256):
//!
//! ```text
//! base64url(header) . base64url(payload) . base64url(hmac(header.payload))
//! ```
//!
//! Decoding checks structure and signature but deliberately does NOT
//! reject expired tokens. Expiry is a separate question
//! ([`TokenCodec::is_expired`], [`TokenCodec::verify`]) so callers can
//! tell a tampered token from a stale one.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{ClaimSet, ClaimValue, Claims, Clock, SignatureService, Token, TokenError};

/// The only algorithm this codec produces or accepts.
const ALGORITHM: &str = "HS256";

#[derive(Serialize, Deserialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

/// Encodes and decodes signed tokens with one secret.
///
/// Cheap to clone: the signer is a small owned secret and the clock is
/// shared behind an `Arc`.
#[derive(Clone)]
pub struct TokenCodec {
    signer: SignatureService,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Creates a codec that signs with `signer` and reads time from `clock`.
    pub fn new(signer: SignatureService, clock: Arc<dyn Clock>) -> Self {
        Self { signer, clock }
    }

    /// Current time according to this codec's clock.
    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Mints a token carrying `claims`, valid for `ttl_secs` from now.
    ///
    /// Sets `iat = now`, `exp = now + ttl_secs`, and a fresh random `jti`.
    /// Reserved keys in `claims` are ignored.
    ///
    /// # Errors
    /// Returns [`TokenError::Encode`] if the payload can't be serialized.
    pub fn encode(&self, claims: &ClaimSet, ttl_secs: u64) -> Result<Token, TokenError> {
        let now = self.now();
        let full = Claims {
            issued_at: now,
            expires_at: now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
            token_id: generate_token_id(),
            values: claims.without_reserved(),
        };

        let header = serde_json::to_vec(&Header {
            alg: ALGORITHM,
            typ: "JWT",
        })
        .map_err(TokenError::Encode)?;
        let payload = serde_json::to_vec(&full).map_err(TokenError::Encode)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.signer.sign(signing_input.as_bytes());

        Ok(Token(format!("{signing_input}.{signature}")))
    }

    /// Verifies the signature and structure of `token` and returns its claims.
    ///
    /// Expired tokens decode successfully.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] if the token is malformed, uses a
    /// different algorithm, or its signature doesn't verify.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Invalid("expected three segments".into()));
        };

        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        if !self.signer.verify(signing_input.as_bytes(), signature) {
            return Err(TokenError::Invalid("signature mismatch".into()));
        }

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Invalid("header is not base64".into()))?;
        let header: Header<'_> = serde_json::from_slice(&header_bytes)
            .map_err(|e| TokenError::Invalid(format!("header: {e}")))?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Invalid(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Invalid("payload is not base64".into()))?;
        serde_json::from_slice(&payload_bytes)
            .map_err(|e| TokenError::Invalid(format!("payload: {e}")))
    }

    /// Decodes `token` and reports whether it has expired.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] if decoding fails.
    pub fn is_expired(&self, token: &str) -> Result<bool, TokenError> {
        let claims = self.decode(token)?;
        Ok(claims.is_expired_at(self.now()))
    }

    /// Decodes `token` and rejects it if expired.
    ///
    /// # Errors
    /// - [`TokenError::Invalid`] if decoding fails
    /// - [`TokenError::Expired`] if `now >= exp`
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.is_expired_at(self.now()) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Reads one caller claim from `token`.
    ///
    /// # Errors
    /// Same as [`decode`](Self::decode).
    pub fn extract_claim(&self, token: &str, key: &str) -> Result<Option<ClaimValue>, TokenError> {
        Ok(self.decode(token)?.get(key).cloned())
    }

    /// Reads every claim from `token`, including `iat`/`exp`/`jti`.
    ///
    /// # Errors
    /// Same as [`decode`](Self::decode).
    pub fn extract_all_claims(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

/// Random 128-bit id as 32 lowercase hex characters.
fn generate_token_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
