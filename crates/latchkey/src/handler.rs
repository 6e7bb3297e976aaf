//! Per-connection handler: registration, outbound delivery, echo.
//!
//! Each accepted peer gets its own Tokio task running this handler.
//! The flow is:
//!   0. Upgrade and authorize within the handshake timeout
//!   1. Register the channel under the user the handshake named
//!   2. Loop: write queued outbound messages, echo inbound text
//!   3. On any exit, the registry guard unregisters the channel

use std::sync::Arc;

use latchkey_registry::{ChannelHandle, ConnectionRegistry, Outbound};
use latchkey_token::UserId;
use latchkey_transport::{
    Connection, HandshakeRequest, Incoming, PendingUpgrade, TransportError, WebSocketConnection,
};

use crate::LatchkeyError;
use crate::server::ServerState;

/// Drop guard that unregisters a channel when the handler exits.
///
/// Unregistering is synchronous, so this runs on every exit path,
/// including early returns and panics.
struct RegistryGuard {
    handle: ChannelHandle,
    registry: Arc<ConnectionRegistry>,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.handle);
    }
}

/// Upgrades a freshly accepted peer and, if it is authorized, serves it.
pub(crate) async fn serve_peer(pending: PendingUpgrade, state: Arc<ServerState>) {
    let peer = pending.peer_addr();
    let upgrade = pending.upgrade(|req: &HandshakeRequest| state.handshakes.authorize(req));

    let (conn, user_id) = match tokio::time::timeout(state.handshake_timeout, upgrade).await {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(TransportError::HandshakeRejected(reason))) => {
            tracing::debug!(%peer, %reason, "upgrade refused");
            return;
        }
        Ok(Err(e)) => {
            tracing::debug!(%peer, error = %e, "upgrade failed");
            return;
        }
        Err(_) => {
            tracing::warn!(%peer, "upgrade not completed in time, dropping peer");
            return;
        }
    };

    if let Err(e) = handle_connection(conn, user_id, state).await {
        tracing::debug!(error = %e, "connection ended with error");
    }
}

/// Handles a single authorized channel from registration to close.
async fn handle_connection(
    conn: WebSocketConnection,
    user_id: UserId,
    state: Arc<ServerState>,
) -> Result<(), LatchkeyError> {
    let conn_id = conn.id();
    let (handle, mut outbound) = state.registry.open_channel(user_id.clone(), conn_id);
    let _guard = RegistryGuard {
        handle,
        registry: Arc::clone(&state.registry),
    };

    tracing::info!(%conn_id, %user_id, "channel open");

    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(Outbound::Text(text)) => {
                    if !send_bounded(&conn, &state, &text).await? {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = tokio::time::timeout(state.send_timeout, conn.close()).await;
                    tracing::debug!(%conn_id, %user_id, "closed by registry");
                    break;
                }
            },

            incoming = tokio::time::timeout(state.idle_timeout, conn.recv()) => match incoming {
                Ok(Ok(Some(data))) => {
                    state.registry.prune(&user_id);
                    let payload = String::from_utf8_lossy(&data);
                    tracing::debug!(%conn_id, %user_id, bytes = data.len(), "message received");
                    let reply = format!("Server received: {payload}");
                    if !send_bounded(&conn, &state, &reply).await? {
                        break;
                    }
                }
                Ok(Ok(None)) => {
                    tracing::info!(%conn_id, %user_id, "channel closed by peer");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::debug!(%conn_id, %user_id, error = %e, "recv error");
                    break;
                }
                Err(_) => {
                    tracing::info!(%conn_id, %user_id, "channel idle, closing");
                    let _ = tokio::time::timeout(state.send_timeout, conn.close()).await;
                    break;
                }
            },
        }
    }

    // _guard drops here → channel unregistered.
    Ok(())
}

/// Writes `text` within the send timeout. Returns `Ok(false)` if the
/// write timed out and the channel should be dropped.
async fn send_bounded(
    conn: &WebSocketConnection,
    state: &ServerState,
    text: &str,
) -> Result<bool, LatchkeyError> {
    match tokio::time::timeout(state.send_timeout, conn.send_text(text)).await {
        Ok(result) => {
            result?;
            Ok(true)
        }
        Err(_) => {
            tracing::warn!(conn_id = %conn.id(), "send timed out, dropping channel");
            Ok(false)
        }
    }
}
