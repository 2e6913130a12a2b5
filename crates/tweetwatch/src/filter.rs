//! Relevance filter.
//!
//! Track keywords only widen what the provider streams to us. Final admission
//! is decided by author alone, so keyword matches from accounts outside the
//! watchlist are dropped.

use std::collections::BTreeSet;

use crate::config::WatchConfig;
use crate::post::RawPost;

/// Read-only set of watched author ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchList {
    follow_ids: BTreeSet<String>,
}

impl WatchList {
    pub fn new(follow_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            follow_ids: follow_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a post should produce a notification.
    pub fn accept(&self, post: &RawPost) -> bool {
        self.follow_ids.contains(&post.author.id)
    }
}

impl From<&WatchConfig> for WatchList {
    fn from(config: &WatchConfig) -> Self {
        Self {
            follow_ids: config.follow_ids.clone(),
        }
    }
}

/// Accept a post iff its author is in the configured follow list.
pub fn accept(post: &RawPost, watch: &WatchConfig) -> bool {
    watch.follow_ids.contains(&post.author.id)
}
