use std::sync::Arc;

use crate::config::HeartbeatConfig;
use crate::db::{MessageStore, SqliteStore, UserStore};
use crate::presence::PresenceRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Durable private message record
    pub messages: Arc<dyn MessageStore>,
    /// Online flag and last-seen stamp on user records
    pub users: Arc<dyn UserStore>,
    /// Active WebSocket connections per user
    pub presence: PresenceRegistry,
    /// Ping/pong keepalive settings for every connection
    pub heartbeat: HeartbeatConfig,
}

impl AppState {
    /// State backed by a single SQLite store for both collaborators.
    pub fn new(store: SqliteStore, heartbeat: HeartbeatConfig) -> Self {
        let store = Arc::new(store);
        Self {
            messages: store.clone(),
            users: store,
            presence: PresenceRegistry::new(),
            heartbeat,
        }
    }
}
