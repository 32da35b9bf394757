//! Shared key/value storage area.
//!
//! One [`StorageArea`] stands for the storage medium of a user agent; every
//! context (tab/window) attaches to it with [`StorageArea::attach`]. Writes are
//! broadcast to all contexts and each context's feed skips its own writes.
//!
//! A file-backed area keeps a JSON object on disk and replaces it atomically
//! on every write. Writes made by other processes are picked up by
//! [`StorageArea::sync_from_disk`] (or the polling watcher) and surface as
//! changes with [`ContextId::EXTERNAL`] origin.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::StorageConfig;
use crate::domain::error::StorageError;
use crate::domain::ports::{ContextId, LocalStorage, StorageChange, StorageEvents};

type Items = BTreeMap<String, String>;

struct AreaInner {
    items: Mutex<Items>,
    path: Option<PathBuf>,
    events: broadcast::Sender<StorageChange>,
    next_context: AtomicU64,
}

/// Storage medium shared by every attached context.
#[derive(Clone)]
pub struct StorageArea {
    inner: Arc<AreaInner>,
}

impl std::fmt::Debug for StorageArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageArea")
            .field("path", &self.inner.path)
            .field("items", &self.inner.items.lock().len())
            .finish_non_exhaustive()
    }
}

impl StorageArea {
    /// Area that lives only as long as the process.
    #[must_use]
    pub fn in_memory(capacity: usize) -> Self {
        Self::build(Items::new(), None, capacity)
    }

    /// Area persisted to `path`. A missing file starts empty; an unreadable
    /// document is ignored and replaced on the next write.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, StorageError> {
        let path = path.into();
        let items = match load(&path)? {
            Some(Ok(items)) => items,
            Some(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable storage document");
                Items::new()
            }
            None => Items::new(),
        };
        info!(path = %path.display(), items = items.len(), "Opened storage area");
        Ok(Self::build(items, Some(path), capacity))
    }

    /// # Errors
    /// See [`open`](Self::open).
    pub fn from_config(cfg: &StorageConfig) -> Result<Self, StorageError> {
        match &cfg.path {
            Some(path) => Self::open(path, cfg.channel_capacity),
            None => Ok(Self::in_memory(cfg.channel_capacity)),
        }
    }

    fn build(items: Items, path: Option<PathBuf>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(AreaInner {
                items: Mutex::new(items),
                path,
                events,
                next_context: AtomicU64::new(ContextId::EXTERNAL.get() + 1),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// New context attached to this area.
    #[must_use]
    pub fn attach(&self) -> ContextStorage {
        let id = ContextId::new(self.inner.next_context.fetch_add(1, Ordering::Relaxed));
        debug!(context = %id, "Attached storage context");
        ContextStorage {
            area: self.clone(),
            id,
        }
    }

    /// Reloads the backing file and broadcasts every difference as an
    /// external change. Returns the number of changed keys.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn sync_from_disk(&self) -> Result<usize, StorageError> {
        let Some(path) = self.inner.path.as_deref() else {
            return Ok(0);
        };
        let mut items = self.inner.items.lock();
        let changes = refresh(path, &mut items)?;
        let count = changes.len();
        drop(items);
        for change in changes {
            self.emit(change);
        }
        Ok(count)
    }

    /// Polls the backing file every `interval` until `token` is cancelled.
    /// Returns `None` for in-memory areas.
    #[must_use]
    pub fn spawn_watcher(
        &self,
        interval: Duration,
        token: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        self.inner.path.as_ref()?;
        let area = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match area.sync_from_disk() {
                            Ok(0) => {}
                            Ok(changed) => debug!(changed, "Picked up external storage writes"),
                            Err(e) => debug!(error = %e, "Storage poll failed"),
                        }
                    }
                }
            }
            debug!("Storage watcher stopped");
        }))
    }

    fn update(
        &self,
        origin: ContextId,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut items = self.inner.items.lock();
        let mut pending = Vec::new();
        if let Some(path) = self.inner.path.as_deref() {
            match refresh(path, &mut items) {
                Ok(external) => pending = external,
                Err(e) => debug!(error = %e, "Storage refresh before write failed"),
            }
        }

        let old = match value {
            Some(v) => items.insert(key.to_owned(), v.to_owned()),
            None => items.remove(key),
        };

        if let Some(path) = self.inner.path.as_deref()
            && let Err(e) = persist(path, &items)
        {
            match &old {
                Some(prev) => items.insert(key.to_owned(), prev.clone()),
                None => items.remove(key),
            };
            drop(items);
            for change in pending {
                self.emit(change);
            }
            return Err(e);
        }
        drop(items);

        if old.as_deref() != value {
            pending.push(StorageChange {
                key: Some(key.to_owned()),
                old_value: old,
                new_value: value.map(ToOwned::to_owned),
                origin,
            });
        }
        for change in pending {
            self.emit(change);
        }
        Ok(())
    }

    fn clear(&self, origin: ContextId) -> Result<(), StorageError> {
        let mut items = self.inner.items.lock();
        if items.is_empty() {
            return Ok(());
        }
        if let Some(path) = self.inner.path.as_deref() {
            persist(path, &Items::new())?;
        }
        items.clear();
        drop(items);
        self.emit(StorageChange {
            key: None,
            old_value: None,
            new_value: None,
            origin,
        });
        Ok(())
    }

    fn emit(&self, change: StorageChange) {
        if self.inner.events.send(change).is_err() {
            trace!("No storage listeners attached");
        }
    }
}

/// Replaces `items` with the file content and returns the differences.
fn refresh(path: &Path, items: &mut Items) -> Result<Vec<StorageChange>, StorageError> {
    let on_disk = match load(path)? {
        Some(parsed) => parsed?,
        None => Items::new(),
    };
    let changes = diff(items, &on_disk);
    *items = on_disk;
    Ok(changes)
}

fn diff(before: &Items, after: &Items) -> Vec<StorageChange> {
    let mut changes = Vec::new();
    for (key, old) in before {
        let new = after.get(key);
        if new != Some(old) {
            changes.push(StorageChange {
                key: Some(key.clone()),
                old_value: Some(old.clone()),
                new_value: new.cloned(),
                origin: ContextId::EXTERNAL,
            });
        }
    }
    for (key, new) in after {
        if !before.contains_key(key) {
            changes.push(StorageChange {
                key: Some(key.clone()),
                old_value: None,
                new_value: Some(new.clone()),
                origin: ContextId::EXTERNAL,
            });
        }
    }
    changes
}

/// `None` when the file does not exist; the inner result is the parse outcome.
fn load(path: &Path) -> Result<Option<Result<Items, StorageError>>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(Some(Ok(Items::new()))),
        Ok(raw) => Ok(Some(serde_json::from_str(&raw).map_err(StorageError::from))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Writes the whole document to a temp file next to `path` and renames it.
fn persist(path: &Path, items: &Items) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

    let body = serde_json::to_vec_pretty(items)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
    tmp.write_all(&body).map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StorageError::io(path, e.error))?;
    Ok(())
}

/// One context's handle on a [`StorageArea`].
#[derive(Debug, Clone)]
pub struct ContextStorage {
    area: StorageArea,
    id: ContextId,
}

impl ContextStorage {
    #[must_use]
    pub fn area(&self) -> &StorageArea {
        &self.area
    }

    /// Removes every key and notifies other contexts with a keyless change.
    ///
    /// # Errors
    /// Returns an error when the empty document cannot be persisted.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.area.clear(self.id)
    }
}

impl LocalStorage for ContextStorage {
    fn context(&self) -> ContextId {
        self.id
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.area.inner.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.area.update(self.id, key, Some(value))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.area.update(self.id, key, None)
    }

    fn watch(&self) -> StorageEvents {
        StorageEvents::new(self.area.inner.events.subscribe(), self.id)
    }
}

#[cfg(test)]
#[path = "area_test.rs"]
mod area_test;
