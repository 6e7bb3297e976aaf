//! Token layer for Latchkey.
//!
//! This crate defines how a user's identity is written down and proven:
//!
//! - **Types** ([`UserId`], [`ClaimSet`], [`Claims`], [`Token`],
//!   [`SealedCookie`]): the values that travel inside cookies and
//!   handshake requests.
//! - **Signing** ([`SignatureService`]): an HMAC-SHA256 primitive bound
//!   to one validated secret.
//! - **Codecs** ([`TokenCodec`], [`CookieSigner`], [`SealedTokenCodec`]):
//!   how claims become a signed, expiring token, and how that token is
//!   wrapped in a second, independent cookie signature.
//! - **Time** ([`Clock`]): where "now" comes from, so expiry can be
//!   tested without sleeping.
//!
//! # Architecture
//!
//! Two integrity layers are stacked on every session cookie:
//!
//! ```text
//! Claims ──TokenCodec──→ Token (inner HMAC) ──CookieSigner──→ "token:sig" (outer HMAC)
//! ```
//!
//! The token layer doesn't know about HTTP, cookie jars or sockets.
//! It only turns claims into strings and back.

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod clock;
mod codec;
mod cookie;
mod error;
mod sealed;
mod signature;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::TokenCodec;
pub use cookie::{CookieSigner, SealBinding};
pub use error::TokenError;
pub use sealed::SealedTokenCodec;
pub use signature::{MIN_SECRET_LEN, SignatureService};
pub use types::{ClaimSet, ClaimValue, Claims, SealedCookie, Token, UserId};
