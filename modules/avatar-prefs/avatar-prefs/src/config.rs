//! Configuration for the avatar-prefs module.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use avatar_prefs_sdk::KeyScheme;
use serde::{Deserialize, Serialize};

/// Configuration for the avatar-prefs module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AvatarPrefsConfig {
    /// Storage key prefix. Default: `nt`.
    pub namespace: String,
    /// Storage key kind. Default: `avatar`.
    pub kind: String,
    pub renderer: RendererConfig,
    pub storage: StorageConfig,
    pub warm_up: WarmUpConfig,
    /// Buffered in-context notifications per subscriber before it lags.
    pub bus_capacity: usize,
}

impl Default for AvatarPrefsConfig {
    fn default() -> Self {
        let scheme = KeyScheme::default();
        Self {
            namespace: scheme.namespace,
            kind: scheme.kind,
            renderer: RendererConfig::default(),
            storage: StorageConfig::default(),
            warm_up: WarmUpConfig::default(),
            bus_capacity: 64,
        }
    }
}

impl AvatarPrefsConfig {
    #[must_use]
    pub fn key_scheme(&self) -> KeyScheme {
        KeyScheme::new(self.namespace.clone(), self.kind.clone())
    }
}

/// Generated-avatar renderer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RendererConfig {
    pub base_url: String,
    pub api_version: String,
    /// Fixed query options appended after the seed, in key order.
    pub options: BTreeMap<String, String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dicebear.com".to_owned(),
            api_version: "7.x".to_owned(),
            options: BTreeMap::from([
                ("backgroundType".to_owned(), "gradientLinear".to_owned()),
                ("radius".to_owned(), "50".to_owned()),
            ]),
        }
    }
}

/// Local storage medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// JSON file shared by every process using the same medium.
    /// `None` keeps preferences in memory only.
    pub path: Option<PathBuf>,
    /// How often the file watcher checks for writes from other processes.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Buffered storage-change events per context before it lags.
    pub channel_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            poll_interval: Duration::from_millis(500),
            channel_capacity: 64,
        }
    }
}

/// Advisory image prefetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WarmUpConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for WarmUpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(3),
        }
    }
}
