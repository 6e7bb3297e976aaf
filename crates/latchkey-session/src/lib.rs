//! Session layer for Latchkey.
//!
//! This crate decides who a request or a channel belongs to:
//!
//! 1. **Cookie sessions**: [`SessionManager`] issues an access/refresh
//!    cookie pair on login, validates it on every request, rotates both
//!    when only the refresh cookie is still good, and clears both on logout.
//! 2. **Channel handshakes**: [`HandshakeAuthorizer`] mints and checks the
//!    short-lived token a client presents when opening a channel.
//! 3. **Credentials**: [`CredentialStore`] and [`PasswordVerifier`] are the
//!    two collaborators the login flow needs from the outside world.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server layer (above)   ← runs login/guard per request, authorizes upgrades
//!     ↕
//! Session layer (this crate)  ← cookie pair state machine, handshake tokens
//!     ↕
//! Token layer (below)    ← TokenCodec, CookieSigner, Clock
//! ```
//!
//! Cookies are read and written through the [`CookieExchange`] trait, so
//! the state machine never touches an HTTP framework directly.

#![allow(async_fn_in_trait)]

mod credentials;
mod error;
mod exchange;
mod handshake;
mod manager;
mod session;

pub use credentials::{CredentialRecord, CredentialStore, MemoryCredentialStore, PasswordVerifier};
pub use error::SessionError;
pub use exchange::{CookieExchange, MemoryExchange};
pub use handshake::{HandshakeAuthorizer, HandshakeConfig};
pub use manager::SessionManager;
pub use session::{AuthOutcome, Secrets, SessionConfig, SessionPair};
