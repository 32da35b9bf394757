//! `AvatarPrefsApi` trait definition.
//!
//! Storage is local and synchronous from the caller's point of view, so the
//! API is synchronous as well.

use crate::errors::AvatarPrefsError;
use crate::models::{Identity, PreferenceRecord};

/// Public API of the avatar-prefs module.
///
/// Obtained from the module:
/// ```ignore
/// let api = module.client();
/// let url = api.resolve_avatar(&identity)?;
/// ```
pub trait AvatarPrefsApi: Send + Sync {
    /// Effective avatar reference: stored preference, else the provider
    /// image, else the derived default.
    fn resolve_avatar(&self, identity: &Identity) -> Result<String, AvatarPrefsError>;

    /// Stored preference. Malformed data reads as `None`.
    fn get_preference(
        &self,
        identity: &Identity,
    ) -> Result<Option<PreferenceRecord>, AvatarPrefsError>;

    /// Replaces the stored preference, notifies every observer of the
    /// identity and returns the resolved reference.
    fn set_preference(
        &self,
        identity: &Identity,
        record: PreferenceRecord,
    ) -> Result<String, AvatarPrefsError>;

    /// Removes the stored preference so the default derivation applies again.
    fn reset_preference(&self, identity: &Identity) -> Result<(), AvatarPrefsError>;
}
