//! Local client implementing the `AvatarPrefsApi` trait.

use std::sync::Arc;

use avatar_prefs_sdk::{AvatarPrefsApi, AvatarPrefsError, Identity, PreferenceRecord};
use tracing::info;

use crate::domain::{AvatarDeriver, PreferenceBus, PreferenceStore};

/// In-process client bound to one context.
///
/// Writes go straight to the store and are published on the context's bus,
/// so mounted views in this context apply the new reference without a re-read
/// and other contexts pick it up from the storage medium.
#[derive(Clone)]
pub struct AvatarPrefsLocalClient {
    store: Arc<PreferenceStore>,
    deriver: Arc<AvatarDeriver>,
    bus: PreferenceBus,
}

impl AvatarPrefsLocalClient {
    #[must_use]
    pub fn new(
        store: Arc<PreferenceStore>,
        deriver: Arc<AvatarDeriver>,
        bus: PreferenceBus,
    ) -> Self {
        Self {
            store,
            deriver,
            bus,
        }
    }
}

impl AvatarPrefsApi for AvatarPrefsLocalClient {
    fn resolve_avatar(&self, identity: &Identity) -> Result<String, AvatarPrefsError> {
        let record = self.store.read(identity)?;
        Ok(self.deriver.resolve(identity, record.as_ref()))
    }

    fn get_preference(
        &self,
        identity: &Identity,
    ) -> Result<Option<PreferenceRecord>, AvatarPrefsError> {
        self.store.read(identity).map_err(AvatarPrefsError::from)
    }

    fn set_preference(
        &self,
        identity: &Identity,
        record: PreferenceRecord,
    ) -> Result<String, AvatarPrefsError> {
        if !record.is_well_formed() {
            return Err(AvatarPrefsError::invalid_record(
                "uploaded payload and linked URL must not be empty",
            ));
        }
        self.store.write(identity, &record)?;

        let key = self.store.key_for(identity);
        let url = self.deriver.resolve(identity, Some(&record));
        self.bus.publish(&key, Some(url.clone()));
        info!(key = %key, "Avatar preference set");
        Ok(url)
    }

    fn reset_preference(&self, identity: &Identity) -> Result<(), AvatarPrefsError> {
        self.store.clear(identity)?;
        let key = self.store.key_for(identity);
        self.bus.publish(&key, None);
        info!(key = %key, "Avatar preference reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocalStorage;
    use crate::infra::StorageArea;
    use avatar_prefs_sdk::{AvatarStyle, KeyScheme};

    fn client() -> AvatarPrefsLocalClient {
        let storage: Arc<dyn LocalStorage> = Arc::new(StorageArea::in_memory(8).attach());
        AvatarPrefsLocalClient::new(
            Arc::new(PreferenceStore::new(Arc::clone(&storage), KeyScheme::default())),
            Arc::new(AvatarDeriver::default()),
            PreferenceBus::new(storage, KeyScheme::default(), 8),
        )
    }

    #[test]
    fn linked_url_round_trip() {
        let client = client();
        let identity = Identity::with_id("u1");
        let record = PreferenceRecord::LinkedUrl {
            url: "https://x/a.png".to_owned(),
        };

        assert_eq!(client.set_preference(&identity, record.clone()).unwrap(), "https://x/a.png");
        assert_eq!(client.get_preference(&identity).unwrap(), Some(record));
        assert_eq!(client.resolve_avatar(&identity).unwrap(), "https://x/a.png");
    }

    #[test]
    fn reset_falls_back_to_provider_image_then_default() {
        let client = client();
        let with_image = Identity::with_id("u1").image("https://idp/u1.png");
        client
            .set_preference(
                &with_image,
                PreferenceRecord::Generated {
                    style: Some(AvatarStyle::Micah),
                    seed: None,
                },
            )
            .unwrap();
        client.reset_preference(&with_image).unwrap();

        assert_eq!(client.get_preference(&with_image).unwrap(), None);
        assert_eq!(client.resolve_avatar(&with_image).unwrap(), "https://idp/u1.png");
        assert_eq!(
            client.resolve_avatar(&Identity::with_id("u1")).unwrap(),
            AvatarDeriver::default().derive(&Identity::with_id("u1"), None, None)
        );
    }

    #[test]
    fn empty_payload_is_rejected() {
        let client = client();
        let err = client
            .set_preference(
                &Identity::with_id("u1"),
                PreferenceRecord::Uploaded { data: String::new() },
            )
            .unwrap_err();
        assert!(matches!(err, AvatarPrefsError::InvalidRecord { .. }));
    }
}
