//! Structural classification of posts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::post::RawPost;

/// How a post relates to other posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipShape {
    /// Neither a repost nor a quote
    Simple,
    /// Re-shares another post without commentary
    Repost,
    /// Embeds another post alongside new text
    Quote,
    /// Re-shares a post that itself quotes another
    RepostOfQuote,
}

impl RelationshipShape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Repost => "repost",
            Self::Quote => "quote",
            Self::RepostOfQuote => "repost_of_quote",
        }
    }
}

impl fmt::Display for RelationshipShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a post from the presence of its top-level nested references.
///
/// Text content never influences the result.
pub fn classify(post: &RawPost) -> RelationshipShape {
    match (post.repost_of.is_some(), post.quotes.is_some()) {
        (false, false) => RelationshipShape::Simple,
        (true, false) => RelationshipShape::Repost,
        (false, true) => RelationshipShape::Quote,
        (true, true) => RelationshipShape::RepostOfQuote,
    }
}
