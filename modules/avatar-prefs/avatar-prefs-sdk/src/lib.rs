//! Avatar preferences SDK
//!
//! This crate provides the public API for the avatar-prefs module:
//! - `AvatarPrefsApi` trait for other components
//! - Model types (`Identity`, `AvatarStyle`, `PreferenceRecord`)
//! - Storage key derivation (`KeyScheme`, `StoreKey`)
//! - Error type (`AvatarPrefsError`)

#![forbid(unsafe_code)]

pub mod api;
pub mod errors;
pub mod key;
pub mod models;

pub use api::AvatarPrefsApi;
pub use errors::AvatarPrefsError;
pub use key::{KeyScheme, StoreKey};
pub use models::{AvatarStyle, FALLBACK_IDENTITY_KEY, Identity, PreferenceRecord};
