//! Storage key derivation.
//!
//! Keys have the form `<namespace>/<kind>-pref/<identity-key>`. The format is
//! shared by every context attached to the same storage medium; a mismatch
//! silently breaks cross-context sync.

use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// Namespace and kind used to build [`StoreKey`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyScheme {
    pub namespace: String,
    pub kind: String,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self {
            namespace: "nt".to_owned(),
            kind: "avatar".to_owned(),
        }
    }
}

impl KeyScheme {
    #[must_use]
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
        }
    }

    #[must_use]
    pub fn key_for(&self, identity: &Identity) -> StoreKey {
        StoreKey(format!(
            "{}/{}-pref/{}",
            self.namespace,
            self.kind,
            identity.key()
        ))
    }
}

/// Fully qualified storage key for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreKey(String);

impl StoreKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a change notification for `changed` concerns this key.
    /// `None` stands for "every key" (the whole area was cleared).
    #[must_use]
    pub fn matches(&self, changed: Option<&str>) -> bool {
        changed.is_none_or(|k| k == self.0)
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoreKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
