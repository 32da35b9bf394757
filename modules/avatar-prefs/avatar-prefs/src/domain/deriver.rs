//! Deterministic avatar reference derivation.
//!
//! Everything here is pure: equal inputs give byte-identical references. The
//! only randomness in the module (the shuffle suffix) is chosen by the caller.

use avatar_prefs_sdk::{AvatarStyle, Identity, PreferenceRecord};

use crate::config::RendererConfig;

/// Builds renderer URLs from `(style, seed)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarDeriver {
    base_url: String,
    api_version: String,
    /// Pre-rendered `&k=v` suffix, options in key order.
    options_query: String,
}

impl Default for AvatarDeriver {
    fn default() -> Self {
        Self::new(&RendererConfig::default())
    }
}

impl AvatarDeriver {
    #[must_use]
    pub fn new(cfg: &RendererConfig) -> Self {
        let options_query = cfg
            .options
            .iter()
            .map(|(k, v)| format!("&{}={}", encode_component(k), encode_component(v)))
            .collect();
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_version: cfg.api_version.trim_matches('/').to_owned(),
            options_query,
        }
    }

    /// Style used when none is pinned: sum of the first UTF-16 unit of every
    /// character of `seed`, modulo the style count.
    #[must_use]
    pub fn default_style(seed: &str) -> AvatarStyle {
        let mut buf = [0u16; 2];
        let index = seed.chars().fold(0usize, |acc, c| {
            (acc + usize::from(c.encode_utf16(&mut buf)[0])) % AvatarStyle::COUNT
        });
        AvatarStyle::ALL[index]
    }

    /// Renderer URL for an explicit style and seed.
    #[must_use]
    pub fn render(&self, style: AvatarStyle, seed: &str) -> String {
        format!(
            "{}/{}/{}/svg?seed={}{}",
            self.base_url,
            self.api_version,
            style.as_str(),
            encode_component(seed),
            self.options_query
        )
    }

    /// Reference for `identity`, optionally pinning a style and overriding the
    /// seed. Blank overrides fall back to the identity seed.
    #[must_use]
    pub fn derive(
        &self,
        identity: &Identity,
        style: Option<AvatarStyle>,
        seed_override: Option<&str>,
    ) -> String {
        let seed = Self::effective_seed(identity, seed_override);
        let style = style.unwrap_or_else(|| Self::default_style(seed));
        self.render(style, seed)
    }

    /// Seed actually used for `identity` and an optional override.
    #[must_use]
    pub fn effective_seed<'a>(identity: &'a Identity, seed_override: Option<&'a str>) -> &'a str {
        seed_override
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| identity.seed())
    }

    /// Style actually displayed for a generated record.
    #[must_use]
    pub fn effective_style(
        identity: &Identity,
        style: Option<AvatarStyle>,
        seed_override: Option<&str>,
    ) -> AvatarStyle {
        style.unwrap_or_else(|| Self::default_style(Self::effective_seed(identity, seed_override)))
    }

    /// New seed for a shuffle: the identity seed plus a caller-chosen suffix.
    #[must_use]
    pub fn shuffled_seed(identity: &Identity, suffix: &str) -> String {
        format!("{}-{suffix}", identity.seed())
    }

    #[must_use]
    pub fn next_style(style: AvatarStyle) -> AvatarStyle {
        style.next()
    }

    /// Image reference for a record, ignoring the provider picture.
    /// Generated records are always re-derived with the current logic.
    #[must_use]
    pub fn preview(&self, identity: &Identity, record: &PreferenceRecord) -> String {
        match record {
            PreferenceRecord::Generated { style, seed } => {
                self.derive(identity, *style, seed.as_deref())
            }
            PreferenceRecord::Uploaded { data } => data.clone(),
            PreferenceRecord::LinkedUrl { url } => url.clone(),
        }
    }

    /// Effective avatar: stored record, else provider picture, else the
    /// default derivation.
    #[must_use]
    pub fn resolve(&self, identity: &Identity, record: Option<&PreferenceRecord>) -> String {
        match record {
            Some(record) => self.preview(identity, record),
            None => identity
                .provider_image()
                .map_or_else(|| self.derive(identity, None, None), ToOwned::to_owned),
        }
    }
}

/// Percent-encodes a query component the way browsers' `encodeURIComponent`
/// does: `!*'()` stay literal on top of the RFC 3986 unreserved set.
fn encode_component(raw: &str) -> String {
    const KEPT: [(&str, &str); 5] = [
        ("%21", "!"),
        ("%2A", "*"),
        ("%27", "'"),
        ("%28", "("),
        ("%29", ")"),
    ];
    // Every '%' in the output starts an escape, so the replacements cannot overlap.
    KEPT.iter()
        .fold(urlencoding::encode(raw).into_owned(), |acc, (escaped, literal)| {
            acc.replace(escaped, literal)
        })
}
