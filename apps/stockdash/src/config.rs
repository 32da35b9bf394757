//! Layered application configuration.
//!
//! Order: defaults -> YAML file (if given) -> environment (`STOCKDASH__*`,
//! `__` separates nesting levels, e.g. `STOCKDASH__DATABASE__DSN`).

use std::path::Path;

use anyhow::{Context, Result};
use avatar_prefs::AvatarPrefsConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use stockdash_db::DbConfig;

pub const ENV_PREFIX: &str = "STOCKDASH__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: DbConfig,
    pub avatar: AvatarPrefsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when neither `-v` nor `RUST_LOG` is set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    /// Loads the layered configuration.
    ///
    /// # Errors
    /// Fails when an explicitly given file does not exist or any layer does
    /// not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract()
            .with_context(|| match path {
                Some(p) => format!("invalid configuration in {}", p.display()),
                None => "invalid configuration".to_owned(),
            })
    }

    /// Effective configuration rendered as JSON.
    ///
    /// # Errors
    /// Fails only if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn clean_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars(
            [
                ("STOCKDASH__DATABASE__DSN", None::<&str>),
                ("STOCKDASH__AVATAR__NAMESPACE", None),
                ("STOCKDASH__LOGGING__LEVEL", None),
            ],
            f,
        )
    }

    #[test]
    fn defaults_without_file_or_env() {
        let cfg = clean_env(|| AppConfig::load(None)).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.database.target_dsn().is_none());
        assert_eq!(cfg.avatar.namespace, "nt");
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockdash.yaml");
        std::fs::write(
            &path,
            "database:\n  dsn: \"sqlite::memory:\"\n  attempt_timeout: 2s\n\
             avatar:\n  storage:\n    poll_interval: 250ms\n\
             logging:\n  format: json\n",
        )
        .unwrap();

        let cfg = clean_env(|| AppConfig::load(Some(&path))).unwrap();
        assert_eq!(cfg.database.target_dsn(), Some("sqlite::memory:"));
        assert_eq!(cfg.database.attempt_timeout, Duration::from_secs(2));
        assert_eq!(cfg.avatar.storage.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockdash.yaml");
        std::fs::write(&path, "database:\n  dsn: \"sqlite://from-file.db\"\n").unwrap();

        let cfg = temp_env::with_vars(
            [
                ("STOCKDASH__DATABASE__DSN", Some("sqlite::memory:")),
                ("STOCKDASH__AVATAR__NAMESPACE", Some("qa")),
            ],
            || AppConfig::load(Some(&path)),
        )
        .unwrap();
        assert_eq!(cfg.database.target_dsn(), Some("sqlite::memory:"));
        assert_eq!(cfg.avatar.namespace, "qa");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/stockdash.yaml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "avatar:\n  colour: red\n").unwrap();
        assert!(clean_env(|| AppConfig::load(Some(&path))).is_err());
    }
}
