//! Row types shared by the store, the WebSocket protocol and the HTTP handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account identifier, owned by the platform's user table.
pub type UserId = i64;

/// A persisted private message between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessage {
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable online flag and last-seen stamp of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: UserId,
    pub username: String,
    pub is_online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}
