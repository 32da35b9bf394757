//! Per-identity preference persistence.

use std::sync::Arc;

use avatar_prefs_sdk::{Identity, KeyScheme, PreferenceRecord, StoreKey};
use tracing::debug;

use super::error::{DomainError, StorageError};
use super::ports::LocalStorage;

/// Reads and writes one [`PreferenceRecord`] per identity. No derivation.
#[derive(Clone)]
pub struct PreferenceStore {
    storage: Arc<dyn LocalStorage>,
    scheme: KeyScheme,
}

impl PreferenceStore {
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>, scheme: KeyScheme) -> Self {
        Self { storage, scheme }
    }

    #[must_use]
    pub fn key_for(&self, identity: &Identity) -> StoreKey {
        self.scheme.key_for(identity)
    }

    #[must_use]
    pub fn scheme(&self) -> &KeyScheme {
        &self.scheme
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn LocalStorage> {
        &self.storage
    }

    /// Stored record for `identity`. Malformed data reads as `None`.
    ///
    /// # Errors
    /// Returns an error when the medium itself cannot be read.
    pub fn read(&self, identity: &Identity) -> Result<Option<PreferenceRecord>, StorageError> {
        let key = self.key_for(identity);
        let Some(raw) = self.storage.get_item(key.as_str())? else {
            return Ok(None);
        };
        let record = PreferenceRecord::decode(&raw);
        if record.is_none() {
            debug!(key = %key, "Ignoring malformed avatar preference");
        }
        Ok(record)
    }

    /// Replaces any prior record for `identity`.
    ///
    /// # Errors
    /// Returns an error when the record cannot be encoded or persisted.
    pub fn write(&self, identity: &Identity, record: &PreferenceRecord) -> Result<(), DomainError> {
        let raw = record.encode().map_err(DomainError::Encode)?;
        self.storage
            .set_item(self.key_for(identity).as_str(), &raw)
            .map_err(DomainError::from)
    }

    /// Removes the record so the default derivation applies again.
    ///
    /// # Errors
    /// Returns an error when the removal cannot be persisted.
    pub fn clear(&self, identity: &Identity) -> Result<(), StorageError> {
        self.storage.remove_item(self.key_for(identity).as_str())
    }
}
