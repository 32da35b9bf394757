//! Interactive avatar editing session.
//!
//! `Closed -> Loading -> Ready -> { Committing -> Closed | cancel -> Closed }`.
//! Every transition in `Ready` updates the draft and the preview together and
//! warms the new preview. Nothing is persisted or published until `commit`.

use std::sync::Arc;

use avatar_prefs_sdk::{AvatarStyle, Identity, PreferenceRecord};
use rand::Rng;
use tracing::{debug, info, warn};

use super::bus::PreferenceBus;
use super::deriver::AvatarDeriver;
use super::error::DomainError;
use super::ports::ImageWarmer;
use super::store::PreferenceStore;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 11;

/// Observable session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Closed,
    Loading,
    Ready,
    Committing,
}

#[derive(Debug, Clone)]
struct Working {
    draft: PreferenceRecord,
    preview: String,
}

/// Editing session for one identity.
pub struct PreferenceSession {
    identity: Identity,
    store: Arc<PreferenceStore>,
    deriver: Arc<AvatarDeriver>,
    bus: PreferenceBus,
    warmer: Arc<dyn ImageWarmer>,
    phase: SessionPhase,
    working: Option<Working>,
}

impl PreferenceSession {
    #[must_use]
    pub fn new(
        identity: Identity,
        store: Arc<PreferenceStore>,
        deriver: Arc<AvatarDeriver>,
        bus: PreferenceBus,
        warmer: Arc<dyn ImageWarmer>,
    ) -> Self {
        Self {
            identity,
            store,
            deriver,
            bus,
            warmer,
            phase: SessionPhase::Closed,
            working: None,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn draft(&self) -> Option<&PreferenceRecord> {
        self.working.as_ref().map(|w| &w.draft)
    }

    #[must_use]
    pub fn preview(&self) -> Option<&str> {
        self.working.as_ref().map(|w| w.preview.as_str())
    }

    /// Seeds the draft from the stored record, or from the default
    /// derivation when there is none. Re-opening an open session reloads it.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read; the session stays closed.
    pub fn open(&mut self) -> Result<&str, DomainError> {
        self.phase = SessionPhase::Loading;
        self.working = None;

        let stored = match self.store.read(&self.identity) {
            Ok(stored) => stored,
            Err(e) => {
                self.phase = SessionPhase::Closed;
                return Err(e.into());
            }
        };
        let draft = stored.unwrap_or_else(PreferenceRecord::default_generated);
        let preview = self.deriver.preview(&self.identity, &draft);
        debug!(key = %self.store.key_for(&self.identity), "Opened avatar session");

        self.phase = SessionPhase::Ready;
        Ok(self.apply(draft, preview))
    }

    /// New random seed; the pinned style is dropped so the default style of
    /// the new seed applies.
    ///
    /// # Errors
    /// [`DomainError::SessionNotOpen`] outside `Ready`.
    pub fn shuffle(&mut self) -> Result<&str, DomainError> {
        let suffix = random_suffix(&mut rand::rng());
        self.shuffle_with(&suffix)
    }

    /// Deterministic shuffle with a caller-chosen suffix.
    ///
    /// # Errors
    /// [`DomainError::SessionNotOpen`] outside `Ready`.
    pub fn shuffle_with(&mut self, suffix: &str) -> Result<&str, DomainError> {
        self.ensure_ready()?;
        let seed = AvatarDeriver::shuffled_seed(&self.identity, suffix);
        Ok(self.set_generated(None, Some(seed)))
    }

    /// Advances the displayed style by one, keeping the seed.
    ///
    /// # Errors
    /// [`DomainError::SessionNotOpen`] outside `Ready`.
    pub fn cycle_style(&mut self) -> Result<&str, DomainError> {
        self.ensure_ready()?;
        let (style, seed) = self.generated_parts();
        let current = AvatarDeriver::effective_style(&self.identity, style, seed.as_deref());
        Ok(self.set_generated(Some(AvatarDeriver::next_style(current)), seed))
    }

    /// Pins style `index`, keeping the seed.
    ///
    /// # Errors
    /// [`DomainError::StyleOutOfRange`] leaves the draft unchanged;
    /// [`DomainError::SessionNotOpen`] outside `Ready`.
    pub fn pick_style(&mut self, index: usize) -> Result<&str, DomainError> {
        self.ensure_ready()?;
        let style = AvatarStyle::from_index(index).ok_or(DomainError::StyleOutOfRange { index })?;
        let (_, seed) = self.generated_parts();
        Ok(self.set_generated(Some(style), seed))
    }

    /// Uses an uploaded payload as is. The payload is not validated.
    ///
    /// # Errors
    /// [`DomainError::SessionNotOpen`] outside `Ready`.
    pub fn upload(&mut self, payload: impl Into<String>) -> Result<&str, DomainError> {
        self.ensure_ready()?;
        let data = payload.into();
        let preview = data.clone();
        Ok(self.apply(PreferenceRecord::Uploaded { data }, preview))
    }

    /// Uses an externally hosted image.
    ///
    /// # Errors
    /// [`DomainError::SessionNotOpen`] outside `Ready`.
    pub fn link_url(&mut self, url: impl Into<String>) -> Result<&str, DomainError> {
        self.ensure_ready()?;
        let url = url.into();
        let preview = url.clone();
        Ok(self.apply(PreferenceRecord::LinkedUrl { url }, preview))
    }

    /// Discards the draft. No store mutation, no notification. No-op when closed.
    pub fn cancel(&mut self) {
        if self.working.take().is_some() {
            debug!(key = %self.store.key_for(&self.identity), "Cancelled avatar session");
        }
        self.phase = SessionPhase::Closed;
    }

    /// Persists the draft, publishes the resolved preview to every observer
    /// of the identity and closes the session.
    ///
    /// On failure nothing is published and the session stays `Ready` with the
    /// draft intact so the caller can retry.
    ///
    /// # Errors
    /// [`DomainError::SessionNotOpen`] outside `Ready`; storage or encoding
    /// errors from the write.
    pub fn commit(&mut self) -> Result<String, DomainError> {
        self.ensure_ready()?;
        let Some(working) = self.working.as_ref() else {
            return Err(DomainError::SessionNotOpen);
        };
        let key = self.store.key_for(&self.identity);

        self.phase = SessionPhase::Committing;
        if let Err(e) = self.store.write(&self.identity, &working.draft) {
            warn!(key = %key, error = %e, "Avatar preference commit failed");
            self.phase = SessionPhase::Ready;
            return Err(e);
        }

        let url = working.preview.clone();
        self.bus.publish(&key, Some(url.clone()));
        info!(key = %key, "Avatar preference committed");

        self.working = None;
        self.phase = SessionPhase::Closed;
        Ok(url)
    }

    fn ensure_ready(&self) -> Result<(), DomainError> {
        if self.phase == SessionPhase::Ready && self.working.is_some() {
            Ok(())
        } else {
            Err(DomainError::SessionNotOpen)
        }
    }

    /// Style and seed of the draft when it is generated; nothing otherwise.
    fn generated_parts(&self) -> (Option<AvatarStyle>, Option<String>) {
        match self.working.as_ref().map(|w| &w.draft) {
            Some(PreferenceRecord::Generated { style, seed }) => (*style, seed.clone()),
            _ => (None, None),
        }
    }

    fn set_generated(&mut self, style: Option<AvatarStyle>, seed: Option<String>) -> &str {
        let preview = self.deriver.derive(&self.identity, style, seed.as_deref());
        self.apply(PreferenceRecord::Generated { style, seed }, preview)
    }

    fn apply(&mut self, draft: PreferenceRecord, preview: String) -> &str {
        let changed = self.preview() != Some(preview.as_str());
        if changed {
            self.warmer.warm(&preview);
        }
        &self.working.insert(Working { draft, preview }).preview
    }
}

/// Lowercase base-36 suffix for shuffled seeds.
fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
