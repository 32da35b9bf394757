//! Domain error types for the avatar-prefs module.

use std::path::PathBuf;

use avatar_prefs_sdk::{AvatarPrefsError, AvatarStyle};
use thiserror::Error;

/// Failure of the local storage medium.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage document is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Domain-level errors for the avatar-prefs module.
#[derive(Error, Debug)]
pub enum DomainError {
    /// A transition or commit was requested while no session is ready.
    #[error("Editing session is not open")]
    SessionNotOpen,

    #[error("Style index {index} is out of range (0..{})", AvatarStyle::COUNT)]
    StyleOutOfRange { index: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to encode preference: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<DomainError> for AvatarPrefsError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::SessionNotOpen => Self::SessionNotOpen,
            DomainError::StyleOutOfRange { index } => Self::StyleOutOfRange {
                index,
                count: AvatarStyle::COUNT,
            },
            DomainError::Storage(e) => Self::storage(e.to_string()),
            DomainError::Encode(e) => {
                tracing::error!(error = %e, "Preference encoding failed");
                Self::internal()
            }
        }
    }
}

impl From<StorageError> for AvatarPrefsError {
    fn from(e: StorageError) -> Self {
        Self::storage(e.to_string())
    }
}
