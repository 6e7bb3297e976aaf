//! Core value types for Latchkey's token layer.
//!
//! These are the values that end up inside cookies and handshake
//! requests: who the user is, what was claimed about them, and the
//! opaque strings that carry those claims.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A user's identity, as carried in the `userId` claim.
///
/// Newtype wrapper around `String` so a user id can't be confused with
/// an email, a cookie name, or any other string in a function signature.
/// `#[serde(transparent)]` keeps the wire form a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a `UserId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// A single claim value: a string or an integer.
///
/// `#[serde(untagged)]` means the JSON form is just the bare value
/// (`"42"` or `42`) with no `{"Text": ...}` wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Text(String),
    Number(i64),
}

impl ClaimValue {
    /// Returns the string form if this is a text claim.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// Returns the integer if this is a number claim.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ClaimValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// The caller-supplied part of a token: arbitrary key/value claims.
///
/// `BTreeMap` (instead of `HashMap`) keeps keys sorted, so two equal
/// claim sets always serialize to the same bytes.
///
/// The keys `iat`, `exp`, and `jti` are reserved for the codec and are
/// dropped at encode time if a caller sets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, ClaimValue>);

impl ClaimSet {
    /// Keys owned by the codec.
    pub const RESERVED: [&'static str; 3] = ["iat", "exp", "jti"];

    /// Creates an empty claim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a claim.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ClaimValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Looks up a claim by key.
    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.0.get(key)
    }

    /// Removes a claim, returning its old value.
    pub fn remove(&mut self, key: &str) -> Option<ClaimValue> {
        self.0.remove(key)
    }

    /// Iterates claims in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.0.iter()
    }

    /// Number of claims.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no claims.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy with the reserved keys stripped.
    pub(crate) fn without_reserved(&self) -> BTreeMap<String, ClaimValue> {
        self.0
            .iter()
            .filter(|(k, _)| !Self::RESERVED.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Decoded claims: the caller's [`ClaimSet`] plus the codec-managed
/// timestamps and token id.
///
/// Immutable once produced by [`TokenCodec::decode`](crate::TokenCodec::decode).
/// Rotation never edits a `Claims`; it copies [`set()`](Self::set) into a
/// brand-new token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued-at, unix seconds.
    #[serde(rename = "iat")]
    pub issued_at: i64,

    /// Expiry, unix seconds. The token is expired once `now >= expires_at`.
    #[serde(rename = "exp")]
    pub expires_at: i64,

    /// Random per-token id, so two tokens minted in the same second differ.
    #[serde(rename = "jti")]
    pub token_id: String,

    /// Everything else.
    #[serde(flatten)]
    pub(crate) values: BTreeMap<String, ClaimValue>,
}

impl Claims {
    /// The caller-visible claims, without `iat`/`exp`/`jti`.
    pub fn set(&self) -> ClaimSet {
        ClaimSet(self.values.clone())
    }

    /// Looks up a caller claim by key.
    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.values.get(key)
    }

    /// Looks up a text claim by key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ClaimValue::as_str)
    }

    /// Returns `true` if the claims are expired at `now` (unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Reads the `userId` claim as a [`UserId`].
    ///
    /// Numeric ids are accepted and converted to their decimal form.
    pub fn user_id(&self) -> Option<UserId> {
        match self.get("userId")? {
            ClaimValue::Text(s) if !s.is_empty() => Some(UserId(s.clone())),
            ClaimValue::Text(_) => None,
            ClaimValue::Number(n) => Some(UserId(n.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Opaque strings
// ---------------------------------------------------------------------------

/// A signed, expiring token produced by [`TokenCodec`](crate::TokenCodec).
///
/// Opaque to everyone except the codec. Never mutated; rotation always
/// produces a new `Token`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(pub(crate) String);

impl Token {
    /// Wraps a raw token string (e.g. read from a query parameter).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrows the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwraps into the token string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cookie value of the form `token:signature`.
///
/// Produced by [`CookieSigner::seal`](crate::CookieSigner::seal); opened
/// and discarded on every read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SealedCookie(pub(crate) String);

impl SealedCookie {
    /// Wraps a raw cookie value read from a request.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrows the cookie value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwraps into the cookie value.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SealedCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
