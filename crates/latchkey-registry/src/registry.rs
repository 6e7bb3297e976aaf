//! The connection registry: user → live channels.
//!
//! # Concurrency
//!
//! Backed by a [`DashMap`], which shards its keys behind separate locks.
//! Every structural change for a user goes through `entry()`, so it runs
//! under that user's shard lock and other users are not blocked. The lock
//! is never held across a map call on another key and never across I/O.
//!
//! A user's entry is removed inside the same locked section that empties
//! it, so no reader ever sees a user with zero channels.
//!
//! Delivery uses snapshot-then-reconcile: clone the handles under the
//! lock, release it, `try_send` to each, then take the lock again only to
//! drop whatever failed.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use latchkey_token::UserId;
use latchkey_transport::ConnectionId;
use crate::{ChannelHandle, DeliveryPolicy, Outbox, RegistryConfig, RegistryError};

/// Tracks every registered channel, grouped by user in connect order.
///
/// Constructed once at startup and shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    users: DashMap<UserId, Vec<ChannelHandle>>,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            users: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Creates a handle sized by the config and registers it.
    pub fn open_channel(
        &self,
        user: UserId,
        id: ConnectionId,
    ) -> (ChannelHandle, Outbox) {
        let (handle, rx) = ChannelHandle::new(id, user, self.config.channel_capacity);
        self.register(handle.clone());
        (handle, rx)
    }

    /// Appends `handle` to its user's channels, then prunes that user.
    ///
    /// Registering the same connection id twice keeps one entry.
    pub fn register(&self, handle: ChannelHandle) {
        let user = handle.user().clone();
        let id = handle.id();
        match self.users.entry(user.clone()) {
            Entry::Occupied(mut entry) => {
                let handles = entry.get_mut();
                if !handles.iter().any(|h| h.id() == id) {
                    handles.push(handle);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![handle]);
            }
        }
        self.prune(&user);
        tracing::info!(
            user_id = %user,
            conn_id = %id,
            channels = self.channel_count(&user),
            "channel registered"
        );
    }

    /// Closes `handle` and removes it. Returns `false` if it was not
    /// registered (already pruned, evicted, or never added).
    pub fn unregister(&self, handle: &ChannelHandle) -> bool {
        handle.close();
        let user = handle.user();
        let removed = match self.users.entry(user.clone()) {
            Entry::Occupied(mut entry) => {
                let handles = entry.get_mut();
                let before = handles.len();
                handles.retain(|h| h.id() != handle.id());
                let removed = handles.len() != before;
                retain_open(handles);
                if handles.is_empty() {
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        };
        if removed {
            tracing::info!(user_id = %user, conn_id = %handle.id(), "channel unregistered");
        }
        removed
    }

    /// Drops every closed channel of `user`, closing it first if needed.
    ///
    /// Returns how many were dropped. Safe to call at any time, any
    /// number of times.
    pub fn prune(&self, user: &UserId) -> usize {
        let Entry::Occupied(mut entry) = self.users.entry(user.clone()) else {
            return 0;
        };
        let handles = entry.get_mut();
        let dropped = retain_open(handles);
        if handles.is_empty() {
            entry.remove();
            tracing::debug!(user_id = %user, "last channel pruned");
        }
        dropped
    }

    /// Delivers `text` to every channel of `user`.
    ///
    /// Returns how many channels accepted it. What happens to channels
    /// that refuse it depends on the [`DeliveryPolicy`].
    ///
    /// # Errors
    /// - [`RegistryError::NoActiveSession`] if the user has no open
    ///   channel, or none accepted the message
    /// - [`RegistryError::SendFailed`] under [`DeliveryPolicy::EvictUser`]
    ///   when some channels accepted and some refused
    pub fn send_to_user(&self, user: &UserId, text: &str) -> Result<usize, RegistryError> {
        self.prune(user);
        let snapshot = self.sessions_for(user);
        if snapshot.is_empty() {
            tracing::debug!(user_id = %user, "no channel to deliver to");
            return Err(RegistryError::NoActiveSession(user.clone()));
        }

        let mut delivered = 0;
        let mut failed = Vec::new();
        for handle in &snapshot {
            match handle.send(text) {
                Ok(()) => delivered += 1,
                Err(_) => failed.push(handle.id()),
            }
        }

        if failed.is_empty() {
            return Ok(delivered);
        }

        match self.config.delivery_policy {
            DeliveryPolicy::EvictUser => {
                self.evict(user);
                if delivered == 0 {
                    return Err(RegistryError::NoActiveSession(user.clone()));
                }
                Err(RegistryError::SendFailed {
                    user: user.clone(),
                    conn: failed[0],
                })
            }
            DeliveryPolicy::DropFailedHandle => {
                self.drop_failed(user, &failed);
                if delivered == 0 {
                    Err(RegistryError::NoActiveSession(user.clone()))
                } else {
                    Ok(delivered)
                }
            }
        }
    }

    /// Snapshot of `user`'s channels in connect order.
    pub fn sessions_for(&self, user: &UserId) -> Vec<ChannelHandle> {
        self.users
            .get(user)
            .map(|handles| handles.value().clone())
            .unwrap_or_default()
    }

    /// Number of registered channels for `user`.
    pub fn channel_count(&self, user: &UserId) -> usize {
        self.users.get(user).map_or(0, |handles| handles.len())
    }

    /// Number of users with at least one channel.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Total registered channels across all users.
    pub fn connection_count(&self) -> usize {
        self.users.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn evict(&self, user: &UserId) {
        if let Some((_, handles)) = self.users.remove(user) {
            for handle in &handles {
                handle.close();
            }
            tracing::warn!(user_id = %user, channels = handles.len(), "user evicted after failed send");
        }
    }

    fn drop_failed(&self, user: &UserId, failed: &[ConnectionId]) {
        if let Entry::Occupied(mut entry) = self.users.entry(user.clone()) {
            let handles = entry.get_mut();
            handles.retain(|h| {
                let keep = !failed.contains(&h.id());
                if !keep {
                    h.close();
                }
                keep
            });
            if handles.is_empty() {
                entry.remove();
            }
        }
        tracing::warn!(user_id = %user, failed = failed.len(), "dropped channels after failed send");
    }
}

/// Keeps open handles, closing and dropping the rest. Returns the number
/// dropped.
fn retain_open(handles: &mut Vec<ChannelHandle>) -> usize {
    let before = handles.len();
    handles.retain(|h| {
        if h.is_open() {
            true
        } else {
            h.close();
            false
        }
    });
    before - handles.len()
}
