use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Typed error for connection acquisition.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// No connection target configured. Not retryable without reconfiguration.
    #[error("database is not configured: set `database.dsn` (or STOCKDASH__DATABASE__DSN)")]
    NotConfigured,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An establishment attempt failed. A later `acquire` may retry.
    #[error("Failed to connect to database (attempt {attempt}): {source}")]
    Connect {
        attempt: u64,
        #[source]
        source: ConnectError,
    },
}

impl DbError {
    /// Returns `true` when calling `acquire` again may succeed without
    /// changing configuration.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

/// Failure of a single establishment attempt.
///
/// `Clone` so that one failed attempt can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection attempt timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("connection task aborted: {0}")]
    Aborted(String),
}
