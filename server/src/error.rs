use thiserror::Error;

/// Failure reported by the message store or the user collaborator.
///
/// These never touch the presence registry. The WebSocket layer turns them
/// into `error` events for the originating connection, the HTTP layer into
/// status codes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl StoreError {
    /// Foreign key violations mean the message referenced an unknown user.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
