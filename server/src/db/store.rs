//! Message store and user collaborator.
//!
//! Both are synchronous traits: implementations are free to block, and
//! callers in async code go through [`blocking`] so persistence never stalls
//! the runtime threads serving other connections.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use crate::db::models::{PrivateMessage, UserId, UserStatus};
use crate::db::DbPool;
use crate::error::StoreError;

/// Durable record of private messages.
pub trait MessageStore: Send + Sync + 'static {
    /// Append a new unread message and return it as stored.
    fn create_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<PrivateMessage, StoreError>;

    /// Flip every unread `sender_id -> receiver_id` message to read.
    /// Returns the number of rows that were unread at update time.
    fn mark_read(&self, sender_id: UserId, receiver_id: UserId) -> Result<usize, StoreError>;

    /// Both directions between `a` and `b`, oldest first.
    fn conversation(&self, a: UserId, b: UserId) -> Result<Vec<PrivateMessage>, StoreError>;

    /// Latest message of every conversation `user_id` takes part in, newest first.
    fn last_messages(&self, user_id: UserId) -> Result<Vec<PrivateMessage>, StoreError>;

    fn unread_count(&self, user_id: UserId) -> Result<u64, StoreError>;
}

/// The online flag and last-seen stamp on the platform's user records.
pub trait UserStore: Send + Sync + 'static {
    /// Persist an online/offline transition. `last_seen_at` is stamped with
    /// `at` only when going offline.
    fn set_online(&self, user_id: UserId, is_online: bool, at: DateTime<Utc>)
        -> Result<(), StoreError>;

    fn status(&self, user_id: UserId) -> Result<Option<UserStatus>, StoreError>;

    fn online_users(&self) -> Result<Vec<UserStatus>, StoreError>;
}

/// Run a store call on the blocking pool.
pub async fn blocking<S, T, F>(store: Arc<S>, f: F) -> Result<T, StoreError>
where
    S: ?Sized + Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&*store)).await?
}

/// SQLite-backed implementation of both stores.
#[derive(Clone)]
pub struct SqliteStore {
    pub pool: DbPool,
}

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, is_read, created_at, updated_at";

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let conn = self.pool.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&conn)?)
    }

    /// Clear online flags left behind by a previous process. The registry
    /// starts empty, so nobody is reachable until they reconnect.
    pub fn reset_online_flags(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_online = 0, last_seen_at = ?1, updated_at = ?1 WHERE is_online = 1",
                params![now],
            )
        })
    }

    fn message_from_row(row: &Row<'_>) -> rusqlite::Result<PrivateMessage> {
        Ok(PrivateMessage {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            receiver_id: row.get(2)?,
            content: row.get(3)?,
            is_read: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn status_from_row(row: &Row<'_>) -> rusqlite::Result<UserStatus> {
        Ok(UserStatus {
            user_id: row.get(0)?,
            username: row.get(1)?,
            is_online: row.get(2)?,
            last_seen_at: row.get(3)?,
        })
    }
}

impl MessageStore for SqliteStore {
    fn create_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<PrivateMessage, StoreError> {
        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO private_messages (sender_id, receiver_id, content, is_read, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)",
                params![sender_id, receiver_id, content, now],
            )?;
            Ok(PrivateMessage {
                id: conn.last_insert_rowid(),
                sender_id,
                receiver_id,
                content: content.to_string(),
                is_read: false,
                created_at: now,
                updated_at: now,
            })
        })
    }

    fn mark_read(&self, sender_id: UserId, receiver_id: UserId) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE private_messages SET is_read = 1, updated_at = ?3
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
                params![sender_id, receiver_id, Utc::now()],
            )
        })
    }

    fn conversation(&self, a: UserId, b: UserId) -> Result<Vec<PrivateMessage>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM private_messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![a, b], Self::message_from_row)?;
            rows.collect()
        })
    }

    fn last_messages(&self, user_id: UserId) -> Result<Vec<PrivateMessage>, StoreError> {
        // ids are monotonic, so the highest id of a pair is its latest message
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM private_messages
                 WHERE id IN (
                     SELECT MAX(id) FROM private_messages
                     WHERE sender_id = ?1 OR receiver_id = ?1
                     GROUP BY MIN(sender_id, receiver_id), MAX(sender_id, receiver_id)
                 )
                 ORDER BY id DESC"
            ))?;
            let rows = stmt.query_map(params![user_id], Self::message_from_row)?;
            rows.collect()
        })
    }

    fn unread_count(&self, user_id: UserId) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM private_messages WHERE receiver_id = ?1 AND is_read = 0",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
        })
        .map(|count| count as u64)
    }
}

impl UserStore for SqliteStore {
    fn set_online(
        &self,
        user_id: UserId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let updated = self.with_conn(|conn| {
            if is_online {
                conn.execute(
                    "UPDATE users SET is_online = 1, updated_at = ?2 WHERE id = ?1",
                    params![user_id, at],
                )
            } else {
                conn.execute(
                    "UPDATE users SET is_online = 0, last_seen_at = ?2, updated_at = ?2 WHERE id = ?1",
                    params![user_id, at],
                )
            }
        })?;
        if updated == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    fn status(&self, user_id: UserId) -> Result<Option<UserStatus>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, is_online, last_seen_at FROM users WHERE id = ?1",
                params![user_id],
                Self::status_from_row,
            )
            .optional()
        })
    }

    fn online_users(&self) -> Result<Vec<UserStatus>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, is_online, last_seen_at FROM users
                 WHERE is_online = 1 ORDER BY id",
            )?;
            let rows = stmt.query_map([], Self::status_from_row)?;
            rows.collect()
        })
    }
}
