//! Mounted avatar consumer.
//!
//! Keeps the displayed reference for one identity current by applying bus
//! notifications. Renderers read [`AvatarView::current`] or await changes on
//! [`AvatarView::changes`].

use std::sync::Arc;

use avatar_prefs_sdk::Identity;
use tokio::sync::watch;
use tracing::warn;

use super::bus::{Notification, PreferenceBus, Subscription};
use super::deriver::AvatarDeriver;
use super::error::StorageError;
use super::store::PreferenceStore;

pub struct AvatarView {
    identity: Identity,
    current: watch::Receiver<String>,
    _subscription: Subscription,
}

impl AvatarView {
    /// Resolves the initial reference and starts following updates.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns an error when the initial read fails.
    pub fn mount(
        identity: Identity,
        store: Arc<PreferenceStore>,
        deriver: Arc<AvatarDeriver>,
        bus: &PreferenceBus,
    ) -> Result<Self, StorageError> {
        let initial = resolve(&identity, &store, &deriver)?;
        let (tx, current) = watch::channel(initial);

        let handler_identity = identity.clone();
        let subscription = bus.subscribe(&identity, move |note| {
            let next = match note {
                Notification::Resolved(url) => url,
                Notification::StorageChanged => {
                    match resolve(&handler_identity, &store, &deriver) {
                        Ok(url) => url,
                        Err(e) => {
                            warn!(
                                key = %store.key_for(&handler_identity),
                                error = %e,
                                "Avatar re-read failed"
                            );
                            return;
                        }
                    }
                }
            };
            tx.send_if_modified(|shown| {
                if *shown == next {
                    false
                } else {
                    *shown = next;
                    true
                }
            });
        });

        Ok(Self {
            identity,
            current,
            _subscription: subscription,
        })
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Reference to display right now.
    #[must_use]
    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    /// Receiver that is notified whenever the displayed reference changes.
    /// Re-applying the same reference does not notify.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<String> {
        self.current.clone()
    }
}

fn resolve(
    identity: &Identity,
    store: &PreferenceStore,
    deriver: &AvatarDeriver,
) -> Result<String, StorageError> {
    let record = store.read(identity)?;
    Ok(deriver.resolve(identity, record.as_ref()))
}
