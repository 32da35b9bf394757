//! Preference-changed notifications.
//!
//! One subscription services two channels: in-context publications (the
//! storage medium never notifies the writer's own context) and storage
//! changes made by other contexts. Key filtering happens here so that
//! subscribers only ever see their own identity.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use avatar_prefs_sdk::{Identity, KeyScheme, StoreKey};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ports::LocalStorage;

/// In-context publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarUpdated {
    pub key: StoreKey,
    /// Ready-to-use reference when the publisher already resolved it.
    pub url: Option<String>,
}

/// What a subscriber is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Apply this reference as is; no re-read needed.
    Resolved(String),
    /// The stored record may have changed; re-read and re-derive.
    StorageChanged,
}

/// Publish/subscribe hub for one context.
#[derive(Clone)]
pub struct PreferenceBus {
    local: broadcast::Sender<AvatarUpdated>,
    storage: Arc<dyn LocalStorage>,
    scheme: KeyScheme,
}

impl PreferenceBus {
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>, scheme: KeyScheme, capacity: usize) -> Self {
        let (local, _) = broadcast::channel(capacity.max(1));
        Self {
            local,
            storage,
            scheme,
        }
    }

    /// Notifies every in-context subscriber of `key`. Other contexts learn
    /// about the change from the storage medium itself.
    pub fn publish(&self, key: &StoreKey, url: Option<String>) {
        let receivers = self
            .local
            .send(AvatarUpdated {
                key: key.clone(),
                url,
            })
            .unwrap_or(0);
        debug!(key = %key, receivers, "Published avatar update");
    }

    /// Calls `handler` for every notification concerning `identity` until the
    /// returned [`Subscription`] is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F>(&self, identity: &Identity, handler: F) -> Subscription
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        let key = self.scheme.key_for(identity);
        let mut local = self.local.subscribe();
        let mut changes = self.storage.watch();
        let active = Arc::new(AtomicBool::new(true));
        let token = CancellationToken::new();

        let task_active = Arc::clone(&active);
        let task_token = token.clone();
        tokio::spawn(async move {
            loop {
                let note = tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    msg = local.recv() => match msg {
                        Ok(ev) if ev.key == key => {
                            ev.url.map_or(Notification::StorageChanged, Notification::Resolved)
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                key = %key,
                                skipped,
                                "Avatar subscriber lagged; resyncing from storage"
                            );
                            Notification::StorageChanged
                        }
                        Err(RecvError::Closed) => break,
                    },
                    change = changes.recv() => match change {
                        Ok(change) if key.matches(change.key.as_deref()) => {
                            Notification::StorageChanged
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                key = %key,
                                skipped,
                                "Storage watcher lagged; resyncing from storage"
                            );
                            Notification::StorageChanged
                        }
                        Err(RecvError::Closed) => break,
                    },
                };
                if !task_active.load(Ordering::Acquire) {
                    break;
                }
                handler(note);
            }
            debug!(key = %key, "Avatar subscription finished");
        });

        Subscription { active, token }
    }
}

/// Live subscription. Dropping it detaches both channels.
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Subscription {
    /// Detaches the handler. No invocation starts after this returns.
    pub fn unsubscribe(self) {
        self.detach();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn detach(&self) {
        self.active.store(false, Ordering::Release);
        self.token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
