//! Transport abstraction layer for Latchkey.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! bidirectional message channels, plus [`HandshakeRequest`]: the parts
//! of an upgrade request an authorizer is allowed to look at.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod handshake;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use handshake::HandshakeRequest;
#[cfg(feature = "websocket")]
pub use websocket::{PendingUpgrade, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// A peer that has connected but not yet been upgraded.
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer.
    ///
    /// Returns as soon as the peer is connected. Nothing is read from it
    /// here, so a silent peer cannot hold up the next `accept`.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A connected peer whose channel is not open yet.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Reads the upgrade request and runs `authorize` on it before the
    /// channel opens.
    ///
    /// If `authorize` fails the peer is refused and no connection is
    /// produced; the error text is sent back to the peer. This waits on
    /// the peer, so callers should bound it with a timeout.
    async fn upgrade<T, E, F>(self, authorize: F) -> Result<(Self::Connection, T), Self::Error>
    where
        F: FnOnce(&HandshakeRequest) -> Result<T, E> + Send,
        E: fmt::Display,
        T: Send;
}

/// A single connection that can send and receive messages.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a text message to the remote peer.
    async fn send_text(&self, text: &str) -> Result<(), Self::Error>;

    /// Sends binary data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection normally.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Closes the connection with a policy-violation status.
    ///
    /// For transports that learn a peer's identity only after the
    /// channel is open: a peer that never presents one is turned away
    /// with this instead of a normal close.
    async fn reject(&self, reason: &str) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "tab-a");
        map.insert(ConnectionId::new(2), "tab-b");
        assert_eq!(map[&ConnectionId::new(1)], "tab-a");
    }
}
