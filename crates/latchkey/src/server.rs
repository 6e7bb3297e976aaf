//! `LatchkeyServer` builder and accept loop.
//!
//! The server owns the WebSocket listener, the handshake authorizer and the
//! connection registry. Each accepted peer gets its own task, which
//! authorizes the upgrade request before the channel opens.

use std::sync::Arc;
use std::time::Duration;

use latchkey_registry::{ConnectionRegistry, RegistryConfig};
use latchkey_session::{
    CredentialStore, HandshakeAuthorizer, HandshakeConfig, PasswordVerifier, Secrets,
    SessionConfig, SessionManager,
};
use latchkey_token::{Clock, SystemClock};
use latchkey_transport::{Transport, WebSocketTransport};

use crate::handler::serve_peer;
use crate::{AuthService, LatchkeyError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) handshakes: HandshakeAuthorizer,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) handshake_timeout: Duration,
    pub(crate) send_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Latchkey server.
///
/// # Example
///
/// ```rust,ignore
/// let server = LatchkeyServer::builder()
///     .bind("0.0.0.0:8080")
///     .send_timeout(Duration::from_secs(2))
///     .build(secrets)
///     .await?;
/// server.run().await
/// ```
pub struct LatchkeyServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    handshake_config: HandshakeConfig,
    registry_config: RegistryConfig,
    handshake_timeout: Duration,
    send_timeout: Duration,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl LatchkeyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            handshake_config: HandshakeConfig::default(),
            registry_config: RegistryConfig::default(),
            handshake_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn handshake_config(mut self, config: HandshakeConfig) -> Self {
        self.handshake_config = config;
        self
    }

    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// How long a connected peer has to finish its upgrade request
    /// before it is dropped.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Upper bound on a single socket write. A write that takes longer
    /// ends the connection.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// How long a channel may go without traffic before it is closed.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Replaces the wall clock, e.g. with a `ManualClock` in tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates the secrets, binds the listener and returns the server.
    ///
    /// # Errors
    /// - [`LatchkeyError::Session`] if any secret is too short
    /// - [`LatchkeyError::Transport`] if the address cannot be bound
    pub async fn build(self, secrets: Secrets) -> Result<LatchkeyServer, LatchkeyError> {
        let sessions = SessionManager::new(self.session_config, &secrets, self.clock.clone())?;
        let handshakes =
            HandshakeAuthorizer::new(&secrets.handshake, self.handshake_config, self.clock)?;

        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            handshakes,
            registry: Arc::new(ConnectionRegistry::new(self.registry_config)),
            handshake_timeout: self.handshake_timeout,
            send_timeout: self.send_timeout,
            idle_timeout: self.idle_timeout,
        });

        Ok(LatchkeyServer {
            transport,
            sessions,
            state,
        })
    }
}

impl Default for LatchkeyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Latchkey server.
///
/// Grab whatever handles you need ([`registry`](Self::registry),
/// [`auth`](Self::auth)) before calling [`run`](Self::run), which consumes
/// the server.
pub struct LatchkeyServer {
    transport: WebSocketTransport,
    sessions: SessionManager,
    state: Arc<ServerState>,
}

impl LatchkeyServer {
    /// Creates a new builder.
    pub fn builder() -> LatchkeyServerBuilder {
        LatchkeyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry application code sends through.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.state.registry)
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn handshakes(&self) -> &HandshakeAuthorizer {
        &self.state.handshakes
    }

    /// An [`AuthService`] sharing this server's secrets and configuration.
    pub fn auth<S, V>(&self, store: S, verifier: V) -> AuthService<S, V>
    where
        S: CredentialStore,
        V: PasswordVerifier,
    {
        AuthService::new(
            self.sessions.clone(),
            self.state.handshakes.clone(),
            store,
            verifier,
        )
    }

    /// Runs the accept loop.
    ///
    /// The loop only accepts sockets. Each peer's upgrade and handshake
    /// authorization run in its own task under the handshake timeout, so
    /// a slow or silent peer holds up nobody else. Refused peers get a 401
    /// and never reach the registry. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), LatchkeyError> {
        tracing::info!("Latchkey server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    tokio::spawn(serve_peer(pending, Arc::clone(&self.state)));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
