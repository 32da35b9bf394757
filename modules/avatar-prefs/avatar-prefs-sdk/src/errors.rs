//! Error types for the avatar-prefs SDK.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvatarPrefsError {
    /// The local storage medium rejected a read or write. Retryable.
    #[error("Preference storage failed: {message}")]
    Storage { message: String },

    #[error("Invalid preference: {reason}")]
    InvalidRecord { reason: String },

    #[error("Style index {index} is out of range (0..{count})")]
    StyleOutOfRange { index: usize, count: usize },

    #[error("Editing session is not open")]
    SessionNotOpen,

    #[error("Internal error")]
    Internal,
}

impl AvatarPrefsError {
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::Internal
    }

    /// Whether the caller may simply retry the same action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
