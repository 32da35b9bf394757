//! Output ports (interfaces) for the domain.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::error::StorageError;

/// Identifies one execution context (tab/window) attached to a storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Origin of changes made outside this process (picked up from disk).
    pub const EXTERNAL: Self = Self(0);

    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// One write observed on the shared medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Changed key; `None` when the whole area was cleared.
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub origin: ContextId,
}

/// Change feed for one context. Writes made by the same context are skipped.
#[derive(Debug)]
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageChange>,
    own: ContextId,
}

impl StorageEvents {
    #[must_use]
    pub fn new(rx: broadcast::Receiver<StorageChange>, own: ContextId) -> Self {
        Self { rx, own }
    }

    /// Next change made by another context.
    ///
    /// # Errors
    /// [`RecvError::Lagged`] when changes were dropped because this receiver
    /// fell behind, [`RecvError::Closed`] when the medium is gone.
    pub async fn recv(&mut self) -> Result<StorageChange, RecvError> {
        loop {
            let change = self.rx.recv().await?;
            if change.origin != self.own {
                return Ok(change);
            }
        }
    }
}

/// Synchronous key/value medium shared by every context of one user agent.
pub trait LocalStorage: Send + Sync {
    fn context(&self) -> ContextId;

    /// # Errors
    /// Returns an error when the medium cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    /// Returns an error when the write could not be made durable; the
    /// previous value is kept in that case.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    /// Same as [`set_item`](Self::set_item).
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Feed of writes made by other contexts.
    fn watch(&self) -> StorageEvents;
}

/// Advisory prefetch of an image reference. Implementations never block and
/// never report failure.
pub trait ImageWarmer: Send + Sync {
    fn warm(&self, reference: &str);
}

/// Warmer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWarmer;

impl ImageWarmer for NoopWarmer {
    fn warm(&self, _reference: &str) {}
}
