pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod session;

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Sender half of a WebSocket connection's outbound channel.
/// Anything holding a clone can push frames to that client; the connection's
/// writer task owns the socket sink.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}
