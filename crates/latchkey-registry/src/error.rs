use latchkey_token::UserId;
use latchkey_transport::ConnectionId;

/// Errors that can occur in the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The user has no live channel, or none of them accepted the message.
    #[error("no active session for user {0}")]
    NoActiveSession(UserId),

    /// A channel refused a message: its queue is full or its task is gone.
    #[error("send failed on {conn} for user {user}")]
    SendFailed { user: UserId, conn: ConnectionId },
}
