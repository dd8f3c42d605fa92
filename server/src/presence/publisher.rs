//! Online/offline transition broadcast.

use chrono::Utc;
use std::sync::Arc;

use crate::db::models::UserId;
use crate::db::store::{blocking, UserStore};
use crate::presence::PresenceRegistry;
use crate::ws::broadcast::broadcast_to_all;
use crate::ws::protocol::ServerEvent;

/// Persist a user's online/offline transition, then tell every connected
/// client about it, the user's own other connections included.
///
/// The durable write completes before the broadcast goes out, so a client
/// that queries the user's status after receiving `user:status` sees the new
/// value. Concurrent transitions for one user race on the durable row; the
/// last write wins. A failed write is logged and the broadcast still happens,
/// since the registry stays authoritative for who is reachable.
pub async fn publish_status(
    users: Arc<dyn UserStore>,
    registry: &PresenceRegistry,
    user_id: UserId,
    is_online: bool,
) {
    let at = Utc::now();
    if let Err(e) = blocking(users, move |users| users.set_online(user_id, is_online, at)).await {
        tracing::warn!(
            user_id = user_id,
            is_online = is_online,
            error = %e,
            "Failed to persist online status"
        );
    }

    let reached = broadcast_to_all(registry, &ServerEvent::UserStatus { user_id, is_online });

    tracing::info!(
        user_id = user_id,
        is_online = is_online,
        connections = reached,
        "User status published"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::UserStatus;
    use crate::error::StoreError;
    use crate::ws::ConnectionId;
    use axum::extract::ws::Message;
    use chrono::DateTime;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingUsers {
        writes: Mutex<Vec<(UserId, bool)>>,
        fail: bool,
    }

    impl UserStore for RecordingUsers {
        fn set_online(&self, user_id: UserId, is_online: bool, _at: DateTime<Utc>) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::LockPoisoned);
            }
            self.writes.lock().unwrap().push((user_id, is_online));
            Ok(())
        }

        fn status(&self, _user_id: UserId) -> Result<Option<UserStatus>, StoreError> {
            Ok(None)
        }

        fn online_users(&self) -> Result<Vec<UserStatus>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn next_status(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<ServerEvent> {
        match rx.try_recv() {
            Ok(Message::Text(text)) => serde_json::from_str(text.as_str()).ok(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_publish_writes_then_broadcasts_to_everyone() {
        let users = Arc::new(RecordingUsers::default());
        let registry = PresenceRegistry::new();
        let (own_tx, mut own_rx) = mpsc::unbounded_channel();
        let (other_tx, mut other_rx) = mpsc::unbounded_channel();
        registry.register(1, ConnectionId::next(), own_tx);
        registry.register(2, ConnectionId::next(), other_tx);

        publish_status(users.clone(), &registry, 1, true).await;

        assert_eq!(*users.writes.lock().unwrap(), vec![(1, true)]);
        let expected = ServerEvent::UserStatus {
            user_id: 1,
            is_online: true,
        };
        assert_eq!(next_status(&mut own_rx), Some(expected.clone()));
        assert_eq!(next_status(&mut other_rx), Some(expected));
    }

    #[tokio::test]
    async fn test_publish_still_broadcasts_when_store_fails() {
        let users = Arc::new(RecordingUsers {
            fail: true,
            ..Default::default()
        });
        let registry = PresenceRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(2, ConnectionId::next(), tx);

        publish_status(users, &registry, 1, false).await;

        assert_eq!(
            next_status(&mut rx),
            Some(ServerEvent::UserStatus {
                user_id: 1,
                is_online: false
            })
        );
        assert!(registry.is_online(2));
    }
}
