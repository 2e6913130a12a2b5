//! Filtered stream connection management.
//!
//! A [`StreamTransport`] opens one connection and yields decoded
//! [`StreamMessage`]s. The [`StreamManager`] owns the connection lifecycle:
//! it reconnects with the provider's suggested delays, surfaces limit notices
//! and terminal failures, and exposes a continuous sequence of posts through a
//! [`StreamHandle`].

pub mod backoff;
pub mod manager;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::codec::StreamMessage;
use crate::config::WatchConfig;

pub use backoff::{Backoff, BackoffPolicy, FailureKind};
pub use manager::{StreamHandle, StreamManager};

/// Provider disconnect codes after which reconnecting cannot succeed.
const TERMINAL_DISCONNECT_CODES: &[u32] = &[
    6, // token revoked
    7, // admin logout
];

/// HTTP statuses after which reconnecting cannot succeed: rejected
/// credentials or parameters, and rate-limit lockout (420/429).
const TERMINAL_HTTP_STATUSES: &[u16] = &[401, 403, 404, 406, 413, 416, 420, 429];

/// Lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        })
    }
}

/// Observability events emitted by the stream manager.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// First connection attempt started
    Connecting,
    /// Provider acknowledged the connection
    Connected,
    /// Connection lost; next attempt after `delay`
    Reconnecting {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// Provider dropped matching posts due to volume
    Limit { undelivered: u64 },
    /// Provider stall warning
    Warning { code: String, message: String },
    /// Unrecoverable failure; the stream has stopped
    Failed { error: String },
    /// Stream closed after shutdown
    Disconnected,
}

impl StreamEvent {
    /// The state this event transitions to, if any.
    pub fn state(&self) -> Option<ConnectionState> {
        match self {
            Self::Connecting => Some(ConnectionState::Connecting),
            Self::Connected => Some(ConnectionState::Connected),
            Self::Reconnecting { .. } => Some(ConnectionState::Reconnecting),
            Self::Failed { .. } => Some(ConnectionState::Failed),
            Self::Disconnected => Some(ConnectionState::Disconnected),
            Self::Limit { .. } | Self::Warning { .. } => None,
        }
    }
}

/// Errors produced by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, reset, stalled or ended
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered the handshake with a non-success status
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// A line could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Provider announced it is closing the connection
    #[error("Provider disconnect (code {code}): {reason}")]
    Disconnect { code: u32, reason: String },
}

impl TransportError {
    pub fn network(msg: impl ToString) -> Self {
        Self::Network(msg.to_string())
    }

    pub fn decode(msg: impl ToString) -> Self {
        Self::Decode(msg.to_string())
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Whether reconnecting after this error is pointless.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Http { status, .. } => TERMINAL_HTTP_STATUSES.contains(status),
            Self::Disconnect { code, .. } => TERMINAL_DISCONNECT_CODES.contains(code),
            Self::Network(_) | Self::Decode(_) => false,
        }
    }

    /// Which back-off schedule applies before the next attempt.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Http { .. } => FailureKind::Http,
            Self::Network(_) | Self::Decode(_) | Self::Disconnect { .. } => FailureKind::Network,
        }
    }
}

/// Errors surfaced to the consumer of a [`StreamHandle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream failed: {0}")]
    Terminal(TransportError),
}

/// Stream of decoded messages for one connection.
pub type MessageStream = BoxStream<'static, Result<StreamMessage, TransportError>>;

/// Filter criteria sent to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams {
    pub follow: Vec<String>,
    pub track: Vec<String>,
}

impl From<&WatchConfig> for FilterParams {
    fn from(config: &WatchConfig) -> Self {
        Self {
            follow: config.follow_ids.iter().cloned().collect(),
            track: config.track_keywords.iter().cloned().collect(),
        }
    }
}

/// Settings for the stream manager.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Reconnect when nothing (not even a keep-alive) arrives for this long
    pub stall_timeout: Duration,
    /// Posts buffered between the connection task and the consumer
    pub channel_capacity: usize,
    pub backoff: BackoffPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(90),
            channel_capacity: 256,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Underlying stream connection.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open one connection. Success means the provider acknowledged the
    /// handshake.
    async fn connect(&self, filter: &FilterParams) -> Result<MessageStream, TransportError>;
}
