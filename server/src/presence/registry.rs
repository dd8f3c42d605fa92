use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::models::UserId;
use crate::ws::{ConnectionId, ConnectionSender};

/// Process-local record of which users are reachable and through which
/// connections. A user may hold any number of connections (tabs, devices).
///
/// Every mutation for a user happens under that user's shard lock through the
/// DashMap entry API, so concurrent connects/disconnects of the same user can
/// neither lose nor duplicate handles. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    users: Arc<DashMap<UserId, HashMap<ConnectionId, ConnectionSender>>>,
}

/// A connection handle as handed out in snapshots.
#[derive(Clone, Debug)]
pub struct Handle {
    pub id: ConnectionId,
    pub sender: ConnectionSender,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection for `user_id`.
    ///
    /// Returns true iff this made the user go from offline to online.
    /// Registering an already registered handle is a no-op returning false.
    pub fn register(&self, user_id: UserId, id: ConnectionId, sender: ConnectionSender) -> bool {
        let mut connections = self.users.entry(user_id).or_default();
        let was_offline = connections.is_empty();
        if connections.contains_key(&id) {
            return false;
        }
        connections.insert(id, sender);

        tracing::debug!(
            user_id = user_id,
            connection_id = id.get(),
            connections = connections.len(),
            "Connection registered"
        );
        was_offline
    }

    /// Remove a connection of `user_id`.
    ///
    /// Returns true iff this removed the user's last connection. The user's
    /// entry is dropped in the same critical section.
    pub fn deregister(&self, user_id: UserId, id: ConnectionId) -> bool {
        match self.users.entry(user_id) {
            Entry::Occupied(mut entry) => {
                if entry.get_mut().remove(&id).is_none() {
                    return false;
                }
                let remaining = entry.get().len();
                tracing::debug!(
                    user_id = user_id,
                    connection_id = id.get(),
                    connections = remaining,
                    "Connection deregistered"
                );
                if remaining == 0 {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Snapshot of the user's connections at call time (possibly empty).
    /// Handles may close between the snapshot and their use.
    pub fn connections_for(&self, user_id: UserId) -> Vec<Handle> {
        self.users
            .get(&user_id)
            .map(|connections| {
                connections
                    .iter()
                    .map(|(id, sender)| Handle {
                        id: *id,
                        sender: sender.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of every open connection in the process.
    pub fn all_connections(&self) -> Vec<Handle> {
        self.users
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .map(|(id, sender)| Handle {
                        id: *id,
                        sender: sender.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.users
            .get(&user_id)
            .map(|connections| !connections.is_empty())
            .unwrap_or(false)
    }

    /// Users with at least one open connection.
    pub fn online_user_ids(&self) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect()
    }
}
