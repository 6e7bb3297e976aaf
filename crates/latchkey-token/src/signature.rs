//! HMAC-SHA256 signing bound to one validated secret.
//!
//! Every signature in Latchkey (the inner token signature and the outer
//! cookie signature) goes through a [`SignatureService`]. The secret is
//! checked once when the service is built; after that, signing cannot
//! fail.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::TokenError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum secret length in bytes (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

/// Keyed-MAC sign/verify over arbitrary bytes.
///
/// Signatures are HMAC-SHA256 tags encoded as unpadded URL-safe base64
/// (43 characters), which is safe to embed in cookie values and URLs.
#[derive(Clone)]
pub struct SignatureService {
    secret: Vec<u8>,
}

impl SignatureService {
    /// Builds a service for `secret`.
    ///
    /// # Errors
    /// Returns [`TokenError::WeakSecret`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes. This is a startup error, not a
    /// per-request one.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret {
                len: secret.len(),
                min: MIN_SECRET_LEN,
            });
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    /// Signs `data` and returns the base64 tag.
    pub fn sign(&self, data: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(self.tag(data))
    }

    /// Checks `signature` against `data`.
    ///
    /// Malformed base64 is simply a mismatch. The tag comparison runs in
    /// constant time (`Mac::verify_slice`).
    pub fn verify(&self, data: &[u8], signature: &str) -> bool {
        let Ok(expected) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        self.mac().chain_update(data).verify_slice(&expected).is_ok()
    }

    /// The raw secret bytes.
    ///
    /// Only the cookie signer needs this, to reproduce the original
    /// `token:secret` signed payload.
    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }

    fn tag(&self, data: &[u8]) -> [u8; 32] {
        self.mac().chain_update(data).finalize().into_bytes().into()
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length; the length check in `new`
        // is a policy, not an HMAC requirement.
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 takes keys of any size"),
        }
    }
}

/// Hand-written so the secret never shows up in logs.
impl std::fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureService")
            .field("secret", &"<redacted>")
            .finish()
    }
}
