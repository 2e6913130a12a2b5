//! Error types for the relay engine.

use thiserror::Error;

use crate::config::ConfigError;
use crate::stream::StreamError;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the relay.
#[derive(Error, Debug)]
pub enum Error {
    /// Watch configuration absent, incomplete or unreadable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The destination channel does not exist or is not usable
    #[error("Failed to resolve channel {channel_id}: {reason}")]
    ChannelResolution { channel_id: String, reason: String },

    /// The stream stopped with a terminal failure
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl Error {
    pub fn channel_resolution(channel_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::ChannelResolution {
            channel_id: channel_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the relay never got as far as opening the stream.
    pub fn is_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ChannelResolution { .. })
    }
}
