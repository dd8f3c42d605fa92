use crate::db::models::UserId;
use crate::presence::PresenceRegistry;
use crate::ws::protocol::ServerEvent;

/// Deliver an event to every live connection of `user_id`.
///
/// The event is encoded once and cloned per connection. A connection whose
/// writer is already gone is skipped without affecting the others, and an
/// offline user makes this a no-op. Returns how many connections accepted it.
pub fn send_to_user(registry: &PresenceRegistry, user_id: UserId, event: &ServerEvent) -> usize {
    let Some(msg) = event.to_message() else {
        return 0;
    };

    let mut delivered = 0;
    for handle in registry.connections_for(user_id) {
        if handle.sender.send(msg.clone()).is_ok() {
            delivered += 1;
        } else {
            tracing::debug!(
                user_id = user_id,
                connection_id = handle.id.get(),
                "Skipping closed connection"
            );
        }
    }
    delivered
}

/// Broadcast an event to every open connection in the process.
pub fn broadcast_to_all(registry: &PresenceRegistry, event: &ServerEvent) -> usize {
    let Some(msg) = event.to_message() else {
        return 0;
    };

    registry
        .all_connections()
        .into_iter()
        .filter(|handle| handle.sender.send(msg.clone()).is_ok())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::ConnectionId;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn received(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            events.push(serde_json::from_str(text.as_str()).unwrap());
        }
        events
    }

    #[test]
    fn test_send_to_user_reaches_every_connection() {
        let registry = PresenceRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (other_tx, mut other_rx) = mpsc::unbounded_channel();
        registry.register(1, ConnectionId::next(), tx1);
        registry.register(1, ConnectionId::next(), tx2);
        registry.register(2, ConnectionId::next(), other_tx);

        let event = ServerEvent::MessageRead { reader_id: 2 };
        assert_eq!(send_to_user(&registry, 1, &event), 2);

        assert_eq!(received(&mut rx1), vec![event.clone()]);
        assert_eq!(received(&mut rx2), vec![event]);
        assert!(received(&mut other_rx).is_empty());
    }

    #[test]
    fn test_send_to_offline_user_is_noop() {
        let registry = PresenceRegistry::new();
        assert_eq!(
            send_to_user(&registry, 9, &ServerEvent::Typing { user_id: 1 }),
            0
        );
    }

    #[test]
    fn test_dead_connection_does_not_block_others() {
        let registry = PresenceRegistry::new();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        registry.register(1, ConnectionId::next(), dead_tx);
        registry.register(1, ConnectionId::next(), live_tx);
        drop(dead_rx);

        let event = ServerEvent::Typing { user_id: 4 };
        assert_eq!(send_to_user(&registry, 1, &event), 1);
        assert_eq!(received(&mut live_rx), vec![event]);
    }

    #[test]
    fn test_broadcast_reaches_all_users() {
        let registry = PresenceRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(1, ConnectionId::next(), tx1);
        registry.register(2, ConnectionId::next(), tx2);

        let event = ServerEvent::UserStatus {
            user_id: 1,
            is_online: true,
        };
        assert_eq!(broadcast_to_all(&registry, &event), 2);
        assert_eq!(received(&mut rx1), vec![event.clone()]);
        assert_eq!(received(&mut rx2), vec![event]);
    }
}
