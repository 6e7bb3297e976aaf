//! Registry configuration.

use serde::Deserialize;

/// What [`send_to_user`](crate::ConnectionRegistry::send_to_user) does
/// when one of a user's channels refuses a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Drop the user's whole entry, closing every channel in it, and fail
    /// the call. Clients reconnect from scratch.
    #[default]
    EvictUser,

    /// Drop only the channels that failed. The call succeeds if at least
    /// one channel accepted the message.
    DropFailedHandle,
}

/// Tuning for a [`ConnectionRegistry`](crate::ConnectionRegistry).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Outbound messages buffered per channel before it counts as stuck.
    pub channel_capacity: usize,

    pub delivery_policy: DeliveryPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            delivery_policy: DeliveryPolicy::default(),
        }
    }
}
