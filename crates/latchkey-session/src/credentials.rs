//! Collaborators the login flow needs from outside: a way to look up
//! credential records and a way to check a password against a hash.
//!
//! Latchkey stores no users and hashes no passwords. You implement
//! [`CredentialStore`] over your database and hand in a
//! [`PasswordVerifier`] for your hash scheme (bcrypt, argon2, ...).

use std::future::Future;

use latchkey_token::UserId;

use crate::SessionError;

/// One stored user, as returned by a [`CredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Opaque to Latchkey; only the [`PasswordVerifier`] reads it.
    pub password_hash: String,
}

/// Looks up credential records by email.
///
/// # Example
///
/// ```rust
/// use latchkey_session::{CredentialRecord, CredentialStore, SessionError};
///
/// struct NoUsers;
///
/// impl CredentialStore for NoUsers {
///     async fn find_by_email(
///         &self,
///         _email: &str,
///     ) -> Result<Vec<CredentialRecord>, SessionError> {
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns every record whose email equals `email`.
    ///
    /// `email` arrives already trimmed and lowercased. Login only
    /// succeeds when exactly one record comes back.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Vec<CredentialRecord>, SessionError>> + Send;
}

/// Checks a plaintext password against a stored hash.
///
/// Any `Fn(&str, &str) -> bool` closure works:
///
/// ```rust
/// use latchkey_session::PasswordVerifier;
///
/// let plain_equals = |plain: &str, hash: &str| plain == hash;
/// assert!(plain_equals.verify("pw", "pw"));
/// ```
pub trait PasswordVerifier: Send + Sync + 'static {
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

impl<F> PasswordVerifier for F
where
    F: Fn(&str, &str) -> bool + Send + Sync + 'static,
{
    fn verify(&self, plain: &str, hash: &str) -> bool {
        self(plain, hash)
    }
}

/// A [`CredentialStore`] over a fixed list of records.
///
/// Emails are matched case-insensitively. Useful for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    records: Vec<CredentialRecord>,
}

impl MemoryCredentialStore {
    pub fn new(records: Vec<CredentialRecord>) -> Self {
        Self { records }
    }

    pub fn insert(&mut self, record: CredentialRecord) {
        self.records.push(record);
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Vec<CredentialRecord>, SessionError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }
}
