//! Watchlist configuration.
//!
//! The persisted record is loaded once at startup through a [`ConfigSource`]
//! and validated into an immutable [`WatchConfig`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// A required field of the watch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    FollowIds,
    TrackKeywords,
    DestinationChannel,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FollowIds => "follow list",
            Self::TrackKeywords => "track list",
            Self::DestinationChannel => "feed channel ID",
        })
    }
}

/// Configuration errors. All of them are fatal to startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration record exists
    #[error("No watch configuration found")]
    Absent,

    /// The record exists but required fields are missing
    #[error("Missing data for {}", join_fields(.0))]
    MissingFields(Vec<ConfigField>),

    /// The source could not be read or parsed
    #[error("Failed to load watch configuration: {0}")]
    Source(String),
}

impl ConfigError {
    pub fn unreadable(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }
}

fn join_fields(fields: &[ConfigField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Persisted watch configuration, as stored. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfigRecord {
    /// Author ids whose posts produce notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow: Option<Vec<String>>,
    /// Keywords that widen what the provider streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<Vec<String>>,
    /// Destination chat channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_channel_id: Option<String>,
}

/// Validated watch configuration, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub follow_ids: BTreeSet<String>,
    pub track_keywords: BTreeSet<String>,
    pub destination_channel_id: String,
}

impl WatchConfig {
    /// Validate a loaded record (or its absence).
    ///
    /// Every missing field is reported, not just the first one.
    pub fn from_record(record: Option<WatchConfigRecord>) -> Result<Self, ConfigError> {
        let record = record.ok_or(ConfigError::Absent)?;

        let mut missing = Vec::new();
        if record.follow.is_none() {
            missing.push(ConfigField::FollowIds);
        }
        if record.track.is_none() {
            missing.push(ConfigField::TrackKeywords);
        }
        if record.feed_channel_id.is_none() {
            missing.push(ConfigField::DestinationChannel);
        }

        match record {
            WatchConfigRecord {
                follow: Some(follow),
                track: Some(track),
                feed_channel_id: Some(channel),
            } => Ok(Self {
                follow_ids: follow.into_iter().collect(),
                track_keywords: track.into_iter().collect(),
                destination_channel_id: channel,
            }),
            _ => Err(ConfigError::MissingFields(missing)),
        }
    }
}

/// Source of the persisted watch configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Read the record once. `Ok(None)` means no record exists.
    async fn load(&self) -> Result<Option<WatchConfigRecord>, ConfigError>;
}
