//! # Latchkey
//!
//! Cookie-session authentication with per-user real-time channels.
//!
//! Latchkey issues a signed access/refresh cookie pair on login, rotates it
//! transparently while the refresh cookie is good, and lets an
//! authenticated user open WebSocket channels that application code can
//! push messages to by user id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use latchkey::prelude::*;
//!
//! # async fn run(secrets: Secrets) -> Result<(), LatchkeyError> {
//! latchkey::init_tracing();
//! let server = LatchkeyServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(secrets)
//!     .await?;
//!
//! // Keep a handle for pushing messages from elsewhere.
//! let registry = server.registry();
//! tokio::spawn(server.run());
//!
//! let _ = registry.send_to_user(&UserId::new("42"), "hello");
//! # Ok(())
//! # }
//! ```

mod auth;
mod error;
mod handler;
mod server;

pub use auth::{AuthService, LoginResponse};
pub use error::LatchkeyError;
pub use server::{LatchkeyServer, LatchkeyServerBuilder};

/// Installs a `tracing` subscriber that honours `RUST_LOG` and falls back
/// to `info`. Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub mod prelude {
    //! Everything needed to wire up a server and its login endpoints.

    pub use crate::{AuthService, LatchkeyError, LatchkeyServer, LatchkeyServerBuilder, LoginResponse};
    pub use latchkey_registry::{
        ChannelHandle, ConnectionRegistry, DeliveryPolicy, Outbound, RegistryConfig, RegistryError,
    };
    pub use latchkey_session::{
        AuthOutcome, CookieExchange, CredentialRecord, CredentialStore, HandshakeAuthorizer,
        HandshakeConfig, MemoryCredentialStore, MemoryExchange, PasswordVerifier, Secrets,
        SessionConfig, SessionError, SessionManager,
    };
    pub use latchkey_token::{
        ClaimSet, ClaimValue, Claims, Clock, ManualClock, SealBinding, SystemClock, Token,
        TokenError, UserId,
    };
    pub use latchkey_transport::{ConnectionId, HandshakeRequest, TransportError};
}
