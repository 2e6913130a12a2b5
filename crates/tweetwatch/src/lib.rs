//! Tweetwatch: filtered tweet stream engine.
//!
//! This crate turns a long-lived filtered stream of posts into rendered
//! notifications for a watchlist of authors.
//!
//! ## Core Types
//!
//! - [`RawPost`] - A single post as delivered by the stream provider
//! - [`RelationshipShape`] - Structural classification (simple, repost, quote, repost of quote)
//! - [`Notification`] - Render-ready record handed to a [`Dispatcher`]
//! - [`WatchConfig`] - Watchlist authors, track keywords and destination channel
//!
//! ## Streaming
//!
//! - [`StreamTransport`] - Trait for the underlying stream connection
//! - [`StreamManager`] - Connection state machine with provider-guided reconnects
//! - [`StreamHandle`] - Continuous sequence of posts observed by the pipeline
//!
//! ## Orchestration
//!
//! - [`Pipeline`] - Filter, classify, render and dispatch, one event at a time
//! - [`RelayService`] - Startup sequence: config, channel resolution, stream

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod notification;
pub mod pipeline;
pub mod post;
pub mod service;
pub mod shape;
pub mod stream;

pub use codec::{StreamMessage, decode_message};
pub use config::{ConfigError, ConfigField, ConfigSource, WatchConfig, WatchConfigRecord};
pub use error::{Error, Result};
pub use filter::{WatchList, accept};
pub use notification::{AttachedField, Notification, render};
pub use pipeline::{DispatchError, Dispatcher, Pipeline, PipelineStats, PostOutcome};
pub use post::{Author, MediaEntity, MediaKind, RawPost};
pub use service::{ChannelResolver, RelayService};
pub use shape::{RelationshipShape, classify};
pub use stream::{
    ConnectionState, FilterParams, StreamConfig, StreamError, StreamEvent, StreamHandle,
    StreamManager, StreamTransport, TransportError,
};
