//! Notification rendering.
//!
//! Maps a classified post to a render-ready [`Notification`]. Rendering is
//! pure and total: the same post and shape always yield the same record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::post::RawPost;
use crate::shape::RelationshipShape;

/// Brand color of every notification.
pub const BRAND_COLOR: u32 = 0x1DA1F2;

/// Footer label of every notification.
pub const FOOTER_TEXT: &str = "Twitter";

/// Footer icon of every notification.
pub const FOOTER_ICON_URL: &str =
    "https://brandpalettes.com/wp-content/uploads/2018/02/twitter_logo-300x300.png";

/// Extra heading/body pair shown under the description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedField {
    pub heading: String,
    pub body: String,
}

/// A rendered notification for one accepted post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub color: u32,
    pub timestamp: DateTime<Utc>,
    /// `@handle` of the posting account
    pub author_name: String,
    pub author_icon_url: Option<String>,
    pub author_url: String,
    pub permalink_url: String,
    pub footer_text: String,
    pub footer_icon_url: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_field: Option<AttachedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Render a post with its shape.
pub fn render(post: &RawPost, shape: RelationshipShape) -> Notification {
    let (title, description, attached_field) = match body_for(post, shape) {
        Some(parts) => parts,
        None => {
            if cfg!(debug_assertions) {
                panic!(
                    "shape {shape} does not match post {} (repost_of: {}, quotes: {})",
                    post.id,
                    post.repost_of.is_some(),
                    post.quotes.is_some()
                );
            }
            simple(post)
        }
    };

    let author = &post.author;
    Notification {
        color: BRAND_COLOR,
        timestamp: post.created_at,
        author_name: author.handle(),
        author_icon_url: author.avatar_url().map(str::to_string),
        author_url: author.profile_url(),
        permalink_url: post.permalink(),
        footer_text: FOOTER_TEXT.to_string(),
        footer_icon_url: FOOTER_ICON_URL.to_string(),
        title,
        description,
        attached_field,
        image_url: image_for(post),
    }
}

type Body = (String, String, Option<AttachedField>);

/// Title, description and field for a shape, or `None` if the post lacks the
/// nested references the shape requires.
fn body_for(post: &RawPost, shape: RelationshipShape) -> Option<Body> {
    let name = &post.author.name;

    match shape {
        RelationshipShape::Simple => Some(simple(post)),
        RelationshipShape::Repost => {
            let original = post.repost_of.as_deref()?;
            Some((
                format!(
                    "{} just retweeted {}'s tweet:",
                    name, original.author.name
                ),
                original.display_text().to_string(),
                None,
            ))
        }
        RelationshipShape::Quote => {
            let quoted = post.quotes.as_deref()?;
            Some((
                format!("{} just quoted {}'s tweet:", name, quoted.author.name),
                post.display_text().to_string(),
                Some(AttachedField {
                    heading: format!("{}'s original tweet:", quoted.author.name),
                    body: quoted.display_text().to_string(),
                }),
            ))
        }
        RelationshipShape::RepostOfQuote => {
            let reposted = post.repost_of.as_deref()?;
            // The field body comes from the top-level quote, not the one
            // nested under the repost.
            let quoted = post.quotes.as_deref()?;
            let nested_quoted_name = reposted
                .quotes
                .as_deref()
                .map(|q| q.author.name.as_str())
                .unwrap_or(quoted.author.name.as_str());
            Some((
                format!(
                    "{} just retweeted {}'s quoted tweet:",
                    name, reposted.author.name
                ),
                reposted.display_text().to_string(),
                Some(AttachedField {
                    heading: format!(
                        "{}'s original tweet that {} quoted:",
                        nested_quoted_name, reposted.author.name
                    ),
                    body: quoted.display_text().to_string(),
                }),
            ))
        }
    }
}

fn simple(post: &RawPost) -> Body {
    (
        format!("{} just tweeted:", post.author.name),
        post.display_text().to_string(),
        None,
    )
}

/// Image from the first media entity, when it is displayable.
fn image_for(post: &RawPost) -> Option<String> {
    post.media()
        .first()
        .filter(|media| media.kind.is_image())
        .map(|media| media.media_url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{Author, MediaEntity, MediaKind};
    use crate::shape::classify;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap()
    }

    fn alice() -> Author {
        Author::new("100", "Alice", "alice").with_avatar("https://img/alice.png")
    }

    fn bob() -> Author {
        Author::new("200", "Bob", "bob")
    }

    fn carol() -> Author {
        Author::new("300", "Carol", "carol")
    }

    #[test]
    fn test_simple_tweet() {
        let post = RawPost::new("1", alice(), "Hello world", at());
        let shape = classify(&post);
        assert_eq!(shape, RelationshipShape::Simple);

        let n = render(&post, shape);
        assert_eq!(n.title, "Alice just tweeted:");
        assert_eq!(n.description, "Hello world");
        assert!(n.attached_field.is_none());
        assert!(n.image_url.is_none());
        assert_eq!(n.author_name, "@alice");
        assert_eq!(n.author_icon_url.as_deref(), Some("https://img/alice.png"));
        assert_eq!(n.author_url, "https://twitter.com/alice");
        assert_eq!(n.permalink_url, "https://twitter.com/alice/status/1");
        assert_eq!(n.color, BRAND_COLOR);
        assert_eq!(n.footer_text, FOOTER_TEXT);
        assert_eq!(n.timestamp, at());
    }

    #[test]
    fn test_repost() {
        let original = RawPost::new("2", bob(), "original words", at());
        let post = RawPost::new("1", alice(), "RT @bob: original…", at()).with_repost_of(original);
        let shape = classify(&post);
        assert_eq!(shape, RelationshipShape::Repost);

        let n = render(&post, shape);
        assert_eq!(n.title, "Alice just retweeted Bob's tweet:");
        assert_eq!(n.description, "original words");
        assert!(n.attached_field.is_none());
        assert_eq!(n.permalink_url, "https://twitter.com/alice/status/1");
    }

    #[test]
    fn test_repost_uses_extended_text_of_original() {
        let original = RawPost::new("2", bob(), "cut off…", at()).with_extended_text("full original");
        let post = RawPost::new("1", alice(), "RT", at()).with_repost_of(original);
        let n = render(&post, classify(&post));
        assert_eq!(n.description, "full original");
    }

    #[test]
    fn test_quote() {
        let quoted = RawPost::new("3", carol(), "quoted words", at());
        let post = RawPost::new("1", alice(), "my take", at()).with_quote(quoted);
        let shape = classify(&post);
        assert_eq!(shape, RelationshipShape::Quote);

        let n = render(&post, shape);
        assert_eq!(n.title, "Alice just quoted Carol's tweet:");
        assert_eq!(n.description, "my take");
        assert_eq!(
            n.attached_field,
            Some(AttachedField {
                heading: "Carol's original tweet:".to_string(),
                body: "quoted words".to_string(),
            })
        );
    }

    #[test]
    fn test_quote_truncation_applies_per_post() {
        let quoted = RawPost::new("3", carol(), "short quoted", at());
        let post = RawPost::new("1", alice(), "my take…", at())
            .with_extended_text("my full take")
            .with_quote(quoted);
        let n = render(&post, classify(&post));
        assert_eq!(n.description, "my full take");
        assert_eq!(n.attached_field.unwrap().body, "short quoted");
    }

    #[test]
    fn test_repost_of_quote_reads_top_level_quote() {
        let nested_quote = RawPost::new("3", carol(), "nested copy", at());
        let top_quote = RawPost::new("3", carol(), "top-level copy", at());
        let reposted = RawPost::new("2", bob(), "bob's comment", at()).with_quote(nested_quote);
        let post = RawPost::new("1", alice(), "RT", at())
            .with_repost_of(reposted)
            .with_quote(top_quote);
        let shape = classify(&post);
        assert_eq!(shape, RelationshipShape::RepostOfQuote);

        let n = render(&post, shape);
        assert_eq!(n.title, "Alice just retweeted Bob's quoted tweet:");
        assert_eq!(n.description, "bob's comment");
        let field = n.attached_field.unwrap();
        assert_eq!(field.heading, "Carol's original tweet that Bob quoted:");
        assert_eq!(field.body, "top-level copy");
    }

    #[test]
    fn test_repost_of_quote_without_nested_quote_uses_top_level_author() {
        let reposted = RawPost::new("2", bob(), "bob's comment", at());
        let post = RawPost::new("1", alice(), "RT", at())
            .with_repost_of(reposted)
            .with_quote(RawPost::new("3", carol(), "quoted", at()));
        let n = render(&post, classify(&post));
        assert_eq!(
            n.attached_field.unwrap().heading,
            "Carol's original tweet that Bob quoted:"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let post = RawPost::new("1", alice(), "my take", at())
            .with_quote(RawPost::new("3", carol(), "quoted", at()))
            .with_media(MediaEntity::new(MediaKind::Photo, "https://img/1.jpg"));
        let shape = classify(&post);
        assert_eq!(render(&post, shape), render(&post, shape));
    }

    #[test]
    fn test_photo_and_gif_attach_image() {
        let photo = RawPost::new("1", alice(), "x", at())
            .with_media(MediaEntity::new(MediaKind::Photo, "https://img/p.jpg"));
        assert_eq!(
            render(&photo, classify(&photo)).image_url.as_deref(),
            Some("https://img/p.jpg")
        );

        let gif = RawPost::new("1", alice(), "x", at())
            .with_media(MediaEntity::new(MediaKind::AnimatedGif, "https://img/g.jpg"));
        assert_eq!(
            render(&gif, classify(&gif)).image_url.as_deref(),
            Some("https://img/g.jpg")
        );
    }

    #[test]
    fn test_other_media_types_ignored() {
        let video = RawPost::new("1", alice(), "x", at())
            .with_media(MediaEntity::new(MediaKind::Video, "https://img/v.jpg"))
            .with_media(MediaEntity::new(MediaKind::Photo, "https://img/p.jpg"));
        assert!(render(&video, classify(&video)).image_url.is_none());
    }

    #[test]
    fn test_image_taken_from_top_level_post_only() {
        let original = RawPost::new("2", bob(), "x", at())
            .with_media(MediaEntity::new(MediaKind::Photo, "https://img/p.jpg"));
        let post = RawPost::new("1", alice(), "RT", at()).with_repost_of(original);
        assert!(render(&post, classify(&post)).image_url.is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not match post")]
    fn test_mismatched_shape_panics_in_debug() {
        let post = RawPost::new("1", alice(), "x", at());
        render(&post, RelationshipShape::Repost);
    }
}
