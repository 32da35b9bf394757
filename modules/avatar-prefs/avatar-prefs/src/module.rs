//! Module declaration for the avatar-prefs module.

use std::sync::Arc;

use avatar_prefs_sdk::{AvatarPrefsApi, Identity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AvatarPrefsConfig, WarmUpConfig};
use crate::domain::{
    AvatarDeriver, AvatarView, ContextId, DomainError, ImageWarmer, LocalStorage, NoopWarmer,
    PreferenceBus, PreferenceSession, PreferenceStore, StorageError,
};
use crate::infra::{HttpWarmer, StorageArea};
use crate::local_client::AvatarPrefsLocalClient;

/// Avatar preferences for one context (tab/window).
///
/// Every module instance attached to the same [`StorageArea`] observes the
/// others' commits through the storage medium.
pub struct AvatarPrefsModule {
    config: AvatarPrefsConfig,
    area: StorageArea,
    context: ContextId,
    store: Arc<PreferenceStore>,
    deriver: Arc<AvatarDeriver>,
    bus: PreferenceBus,
    warmer: Arc<dyn ImageWarmer>,
}

impl AvatarPrefsModule {
    /// Opens the configured storage medium and attaches the first context.
    ///
    /// # Errors
    /// Returns an error when a configured storage file cannot be read.
    pub fn init(config: AvatarPrefsConfig) -> Result<Self, DomainError> {
        info!("Initializing avatar_prefs module");
        let area = StorageArea::from_config(&config.storage)?;
        let module = Self::with_area(config, &area);
        info!(
            context = %module.context,
            persistent = area.path().is_some(),
            "avatar_prefs module initialized"
        );
        Ok(module)
    }

    /// Attaches another context to an existing medium.
    #[must_use]
    pub fn with_area(config: AvatarPrefsConfig, area: &StorageArea) -> Self {
        let storage = area.attach();
        let context = storage.context();
        let storage: Arc<dyn LocalStorage> = Arc::new(storage);
        let scheme = config.key_scheme();
        debug!(
            context = %context,
            namespace = %scheme.namespace,
            kind = %scheme.kind,
            "Attaching avatar_prefs context"
        );

        Self {
            store: Arc::new(PreferenceStore::new(Arc::clone(&storage), scheme.clone())),
            deriver: Arc::new(AvatarDeriver::new(&config.renderer)),
            bus: PreferenceBus::new(storage, scheme, config.bus_capacity),
            warmer: build_warmer(&config.warm_up),
            area: area.clone(),
            context,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AvatarPrefsConfig {
        &self.config
    }

    #[must_use]
    pub fn area(&self) -> &StorageArea {
        &self.area
    }

    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context
    }

    #[must_use]
    pub fn store(&self) -> &Arc<PreferenceStore> {
        &self.store
    }

    #[must_use]
    pub fn deriver(&self) -> &Arc<AvatarDeriver> {
        &self.deriver
    }

    #[must_use]
    pub fn bus(&self) -> &PreferenceBus {
        &self.bus
    }

    /// Closed editing session for `identity`; call `open` to start editing.
    #[must_use]
    pub fn editor(&self, identity: Identity) -> PreferenceSession {
        PreferenceSession::new(
            identity,
            Arc::clone(&self.store),
            Arc::clone(&self.deriver),
            self.bus.clone(),
            Arc::clone(&self.warmer),
        )
    }

    /// Mounted view following `identity`. Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Returns an error when the initial read fails.
    pub fn mount(&self, identity: Identity) -> Result<AvatarView, StorageError> {
        AvatarView::mount(
            identity,
            Arc::clone(&self.store),
            Arc::clone(&self.deriver),
            &self.bus,
        )
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn AvatarPrefsApi> {
        Arc::new(AvatarPrefsLocalClient::new(
            Arc::clone(&self.store),
            Arc::clone(&self.deriver),
            self.bus.clone(),
        ))
    }

    /// Starts polling the storage file for writes from other processes.
    /// Returns `None` for in-memory storage.
    #[must_use]
    pub fn spawn_storage_watcher(&self, token: CancellationToken) -> Option<JoinHandle<()>> {
        self.area.spawn_watcher(self.config.storage.poll_interval, token)
    }
}

fn build_warmer(cfg: &WarmUpConfig) -> Arc<dyn ImageWarmer> {
    if !cfg.enabled {
        return Arc::new(NoopWarmer);
    }
    match HttpWarmer::new(cfg.timeout) {
        Ok(warmer) => Arc::new(warmer),
        Err(e) => {
            warn!(error = %e, "Avatar warm-up disabled: TLS setup failed");
            Arc::new(NoopWarmer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn quiet_config() -> AvatarPrefsConfig {
        AvatarPrefsConfig {
            warm_up: WarmUpConfig {
                enabled: false,
                ..WarmUpConfig::default()
            },
            ..AvatarPrefsConfig::default()
        }
    }

    #[test]
    fn contexts_on_one_area_are_distinct() {
        let first = AvatarPrefsModule::init(quiet_config()).unwrap();
        let second = AvatarPrefsModule::with_area(quiet_config(), first.area());
        assert_ne!(first.context(), second.context());
    }

    #[test]
    fn file_storage_is_opened_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let cfg = AvatarPrefsConfig {
            storage: StorageConfig {
                path: Some(path.clone()),
                ..StorageConfig::default()
            },
            ..quiet_config()
        };

        let module = AvatarPrefsModule::init(cfg).unwrap();
        assert_eq!(module.area().path(), Some(path.as_path()));
    }
}
