//! Public models for the avatar-prefs module.
//!
//! These are transport-agnostic data structures shared by every context that
//! reads or writes avatar preferences. The serialized form of
//! [`PreferenceRecord`] is the on-storage wire format and must stay stable.

use serde::{Deserialize, Serialize};

/// Stable user reference supplied by the identity provider.
///
/// Every field is optional; empty strings are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Picture the identity provider already has for this user.
    pub image: Option<String>,
}

/// Fallback identity key when no field is set.
pub const FALLBACK_IDENTITY_KEY: &str = "user";

fn non_empty(field: Option<&String>) -> Option<&str> {
    field.map(String::as_str).filter(|s| !s.is_empty())
}

impl Identity {
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Identity-derived string used in storage keys.
    ///
    /// Priority: `id` > `email` > `display_name` > [`FALLBACK_IDENTITY_KEY`].
    /// Every producer and consumer of the shared storage must use this order.
    #[must_use]
    pub fn key(&self) -> &str {
        non_empty(self.id.as_ref())
            .or_else(|| non_empty(self.email.as_ref()))
            .or_else(|| non_empty(self.display_name.as_ref()))
            .unwrap_or(FALLBACK_IDENTITY_KEY)
    }

    /// Natural derivation seed. Same priority as [`key`](Self::key).
    #[must_use]
    pub fn seed(&self) -> &str {
        self.key()
    }

    /// Provider picture, if one is set.
    #[must_use]
    pub fn provider_image(&self) -> Option<&str> {
        non_empty(self.image.as_ref())
    }

    /// Glyph shown while no image is available.
    #[must_use]
    pub fn initial(&self) -> char {
        non_empty(self.display_name.as_ref())
            .and_then(|name| name.chars().next())
            .unwrap_or('U')
    }
}

/// Generated avatar styles. Order is significant: default selection and
/// cycling index into [`AvatarStyle::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvatarStyle {
    Adventurer,
    Bottts,
    FunEmoji,
    Micah,
    Identicon,
    Shapes,
}

impl AvatarStyle {
    pub const ALL: [Self; 6] = [
        Self::Adventurer,
        Self::Bottts,
        Self::FunEmoji,
        Self::Micah,
        Self::Identicon,
        Self::Shapes,
    ];

    pub const COUNT: usize = Self::ALL.len();

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Adventurer => 0,
            Self::Bottts => 1,
            Self::FunEmoji => 2,
            Self::Micah => 3,
            Self::Identicon => 4,
            Self::Shapes => 5,
        }
    }

    /// Following style, wrapping after the last one.
    #[must_use]
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::COUNT]
    }

    /// Path segment used by the renderer.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Adventurer => "adventurer",
            Self::Bottts => "bottts",
            Self::FunEmoji => "fun-emoji",
            Self::Micah => "micah",
            Self::Identicon => "identicon",
            Self::Shapes => "shapes",
        }
    }
}

impl std::fmt::Display for AvatarStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed avatar choice for an identity.
///
/// Absence of a record means "derive the default from the identity seed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum PreferenceRecord {
    /// Computed on demand. A missing style falls back to the seed-derived
    /// default; a missing seed falls back to the identity seed.
    #[serde(rename = "dicebear")]
    Generated {
        #[serde(rename = "sprite", default, skip_serializing_if = "Option::is_none")]
        style: Option<AvatarStyle>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<String>,
    },
    /// Inline image payload, typically a `data:` URL.
    #[serde(rename = "upload")]
    Uploaded {
        #[serde(rename = "dataUrl")]
        data: String,
    },
    /// Externally hosted image.
    #[serde(rename = "url")]
    LinkedUrl { url: String },
}

impl PreferenceRecord {
    /// Record that keeps the identity's natural seed and default style.
    #[must_use]
    pub fn default_generated() -> Self {
        Self::Generated {
            style: None,
            seed: None,
        }
    }

    /// Serializes to the storage wire format.
    ///
    /// # Errors
    /// Returns the serializer error; not expected for well-formed values.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses the storage wire format.
    ///
    /// Returns `None` for anything that is not a well-formed record: invalid
    /// JSON, unknown mode or style, missing fields, or an empty payload/URL.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let record: Self = serde_json::from_str(raw).ok()?;
        record.is_well_formed().then_some(record)
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Generated { .. } => true,
            Self::Uploaded { data } => !data.is_empty(),
            Self::LinkedUrl { url } => !url.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_priority_is_id_then_email_then_name_then_fallback() {
        let full = Identity::with_id("u1").email("a@x.io").display_name("Ann");
        assert_eq!(full.key(), "u1");

        let no_id = Identity::default().email("a@x.io").display_name("Ann");
        assert_eq!(no_id.key(), "a@x.io");

        let name_only = Identity::default().display_name("Ann");
        assert_eq!(name_only.key(), "Ann");

        assert_eq!(Identity::default().key(), FALLBACK_IDENTITY_KEY);
    }

    #[test]
    fn empty_fields_are_skipped() {
        let identity = Identity {
            id: Some(String::new()),
            email: Some("a@x.io".to_owned()),
            display_name: None,
            image: Some(String::new()),
        };
        assert_eq!(identity.key(), "a@x.io");
        assert_eq!(identity.provider_image(), None);
    }

    #[test]
    fn initial_comes_from_display_name() {
        assert_eq!(Identity::default().display_name("ann").initial(), 'a');
        assert_eq!(Identity::with_id("u1").initial(), 'U');
    }

    #[test]
    fn style_cycle_wraps() {
        assert_eq!(AvatarStyle::Adventurer.next(), AvatarStyle::Bottts);
        assert_eq!(AvatarStyle::Shapes.next(), AvatarStyle::Adventurer);
        for (i, style) in AvatarStyle::ALL.iter().enumerate() {
            assert_eq!(style.index(), i);
            assert_eq!(AvatarStyle::from_index(i), Some(*style));
        }
        assert_eq!(AvatarStyle::from_index(AvatarStyle::COUNT), None);
    }

    #[test]
    fn wire_format_matches_stored_documents() {
        let generated = PreferenceRecord::Generated {
            style: Some(AvatarStyle::FunEmoji),
            seed: Some("u1-k3j".to_owned()),
        };
        assert_eq!(
            generated.encode().unwrap(),
            r#"{"mode":"dicebear","sprite":"fun-emoji","seed":"u1-k3j"}"#
        );
        assert_eq!(
            PreferenceRecord::default_generated().encode().unwrap(),
            r#"{"mode":"dicebear"}"#
        );

        let uploaded = PreferenceRecord::decode(
            r#"{"mode":"upload","dataUrl":"data:image/png;base64,AAA"}"#,
        );
        assert_eq!(
            uploaded,
            Some(PreferenceRecord::Uploaded {
                data: "data:image/png;base64,AAA".to_owned()
            })
        );

        let linked =
            PreferenceRecord::decode(r#"{"mode":"url","url":"https://x/a.png","extra":1}"#);
        assert_eq!(
            linked,
            Some(PreferenceRecord::LinkedUrl {
                url: "https://x/a.png".to_owned()
            })
        );
    }

    #[test]
    fn malformed_documents_decode_as_absent() {
        for raw in [
            "",
            "not json",
            "{}",
            r#"{"mode":"gravatar"}"#,
            r#"{"mode":"dicebear","sprite":"pixel-art"}"#,
            r#"{"mode":"upload"}"#,
            r#"{"mode":"upload","dataUrl":""}"#,
            r#"{"mode":"url","url":""}"#,
        ] {
            assert_eq!(PreferenceRecord::decode(raw), None, "{raw}");
        }
    }
}
