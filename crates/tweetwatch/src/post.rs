//! Post model as delivered by the stream provider.
//!
//! Field names follow the provider's v1.1 JSON payload so a stream line can be
//! deserialized directly. Nested reposts and quotes are owned boxes, which keeps
//! every post a self-contained value with no back-references.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Character count at which the provider truncates the short text field.
pub const SHORT_TEXT_LIMIT: usize = 140;

/// Base URL used for author and status permalinks.
pub const PROFILE_BASE_URL: &str = "https://twitter.com";

/// Author of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Stable numeric id, as a string
    #[serde(rename = "id_str")]
    pub id: String,
    /// Display name
    pub name: String,
    /// Handle without the leading `@`
    pub screen_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url_https: Option<String>,
}

impl Author {
    /// Create an author without an avatar.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        screen_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            screen_name: screen_name.into(),
            profile_image_url: None,
            profile_image_url_https: None,
        }
    }

    /// Set the avatar URL.
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.profile_image_url = Some(url.into());
        self
    }

    /// Avatar URL, preferring the https variant.
    pub fn avatar_url(&self) -> Option<&str> {
        self.profile_image_url_https
            .as_deref()
            .or(self.profile_image_url.as_deref())
    }

    /// `@handle` form of the author.
    pub fn handle(&self) -> String {
        format!("@{}", self.screen_name)
    }

    /// Link to the author's profile page.
    pub fn profile_url(&self) -> String {
        format!("{}/{}", PROFILE_BASE_URL, self.screen_name)
    }
}

/// Media type of an attached entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    AnimatedGif,
    Video,
    #[serde(other)]
    Other,
}

impl MediaKind {
    /// Whether the media can be shown as a still image.
    pub fn is_image(self) -> bool {
        matches!(self, Self::Photo | Self::AnimatedGif)
    }
}

/// A media entity attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntity {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub media_url: String,
}

impl MediaEntity {
    pub fn new(kind: MediaKind, media_url: impl Into<String>) -> Self {
        Self {
            kind,
            media_url: media_url.into(),
        }
    }
}

/// A link entity found in the post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntity {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedEntities {
    #[serde(default)]
    pub media: Vec<MediaEntity>,
}

/// Untruncated text of a long post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedTweet {
    pub full_text: String,
}

/// One post from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPost {
    #[serde(rename = "id_str")]
    pub id: String,
    #[serde(rename = "user")]
    pub author: Author,
    #[serde(default)]
    pub text: String,
    /// Set by the provider when `text` was cut at [`SHORT_TEXT_LIMIT`]
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_tweet: Option<ExtendedTweet>,
    #[serde(with = "provider_time")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_entities: Option<ExtendedEntities>,
    #[serde(default)]
    pub possibly_sensitive: bool,
    /// The post this one re-shares
    #[serde(
        default,
        rename = "retweeted_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub repost_of: Option<Box<RawPost>>,
    /// The post this one embeds
    #[serde(
        default,
        rename = "quoted_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub quotes: Option<Box<RawPost>>,
}

impl RawPost {
    /// Create a plain post.
    pub fn new(
        id: impl Into<String>,
        author: Author,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            author,
            text: text.into(),
            truncated: false,
            extended_tweet: None,
            created_at,
            in_reply_to_screen_name: None,
            entities: Entities::default(),
            extended_entities: None,
            possibly_sensitive: false,
            repost_of: None,
            quotes: None,
        }
    }

    /// Attach the untruncated text and mark the post as truncated.
    pub fn with_extended_text(mut self, full_text: impl Into<String>) -> Self {
        self.truncated = true;
        self.extended_tweet = Some(ExtendedTweet {
            full_text: full_text.into(),
        });
        self
    }

    /// Set the re-shared post.
    pub fn with_repost_of(mut self, original: RawPost) -> Self {
        self.repost_of = Some(Box::new(original));
        self
    }

    /// Set the embedded post.
    pub fn with_quote(mut self, quoted: RawPost) -> Self {
        self.quotes = Some(Box::new(quoted));
        self
    }

    /// Append a media entity.
    pub fn with_media(mut self, media: MediaEntity) -> Self {
        self.extended_entities
            .get_or_insert_with(ExtendedEntities::default)
            .media
            .push(media);
        self
    }

    /// Text to show for this post.
    ///
    /// The extended text is used when the short field was cut by the provider
    /// (flagged, or already at the limit) and an extended text is present.
    pub fn display_text(&self) -> &str {
        match &self.extended_tweet {
            Some(extended)
                if self.truncated || self.text.chars().count() >= SHORT_TEXT_LIMIT =>
            {
                &extended.full_text
            }
            _ => &self.text,
        }
    }

    /// Media entities in provider order.
    pub fn media(&self) -> &[MediaEntity] {
        self.extended_entities
            .as_ref()
            .map(|e| e.media.as_slice())
            .unwrap_or_default()
    }

    /// Whether the post starts a reply to another account.
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_screen_name.is_some()
    }

    /// Whether the post carries link entities.
    pub fn has_links(&self) -> bool {
        !self.entities.urls.is_empty()
    }

    /// Canonical status URL.
    pub fn permalink(&self) -> String {
        format!("{}/status/{}", self.author.profile_url(), self.id)
    }
}

/// Provider timestamp format, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
mod provider_time {
    use super::*;
    use serde::{Deserializer, Serializer, de::Error as _};

    const FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&raw, FORMAT)
            .map(|dt| Utc.from_utc_datetime(&dt.naive_utc()))
            .map_err(|e| D::Error::custom(format!("invalid created_at {raw:?}: {e}")))
    }
}
