//! Avatar Preferences Module Implementation
//!
//! Derives default avatars, persists one preference per identity in a local
//! storage medium, drives the interactive editing session and keeps every
//! mounted view of the same identity in sync across contexts.
//!
//! The public API is defined in `avatar-prefs-sdk` and re-exported here.

pub use avatar_prefs_sdk::{
    AvatarPrefsApi, AvatarPrefsError, AvatarStyle, Identity, KeyScheme, PreferenceRecord,
    StoreKey,
};

pub mod module;
pub use module::AvatarPrefsModule;

pub mod local_client;

pub mod config;
pub mod domain;
pub mod infra;

pub use config::AvatarPrefsConfig;
pub use domain::{AvatarView, Notification, PreferenceSession, SessionPhase, Subscription};
pub use infra::StorageArea;
