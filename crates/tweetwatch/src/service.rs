//! Relay startup sequence.
//!
//! Load and validate the watch configuration, resolve the destination
//! channel, then open the stream and run the pipeline. Nothing is streamed
//! unless the first two steps succeed.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ConfigSource, WatchConfig};
use crate::error::Result;
use crate::filter::WatchList;
use crate::pipeline::{Dispatcher, Pipeline, PipelineStats};
use crate::stream::{FilterParams, StreamConfig, StreamManager, StreamTransport};

/// Resolves a destination channel id into a [`Dispatcher`] for it.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    /// Fails with [`Error::ChannelResolution`](crate::Error::ChannelResolution)
    /// when the channel is unknown or outside the home workspace.
    async fn resolve(&self, channel_id: &str) -> Result<Arc<dyn Dispatcher>>;
}

/// Wires configuration, channel resolution, the stream and the pipeline.
pub struct RelayService {
    config_source: Arc<dyn ConfigSource>,
    resolver: Arc<dyn ChannelResolver>,
    transport: Arc<dyn StreamTransport>,
    stream_config: StreamConfig,
}

impl RelayService {
    pub fn new(
        config_source: Arc<dyn ConfigSource>,
        resolver: Arc<dyn ChannelResolver>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self {
            config_source,
            resolver,
            transport,
            stream_config: StreamConfig::default(),
        }
    }

    pub fn with_stream_config(mut self, stream_config: StreamConfig) -> Self {
        self.stream_config = stream_config;
        self
    }

    /// Load the configuration and resolve its destination channel.
    pub async fn prepare(&self) -> Result<(WatchConfig, Arc<dyn Dispatcher>)> {
        let record = self.config_source.load().await?;
        let config = WatchConfig::from_record(record)?;
        info!(
            follow = config.follow_ids.len(),
            track = config.track_keywords.len(),
            channel = %config.destination_channel_id,
            "Loaded watch configuration"
        );

        let dispatcher = self.resolver.resolve(&config.destination_channel_id).await?;
        info!(channel = %dispatcher.channel_id(), "Resolved destination channel");

        Ok((config, dispatcher))
    }

    /// Run until cancellation or a terminal stream failure.
    pub async fn run(&self, cancel: CancellationToken) -> Result<PipelineStats> {
        let (config, dispatcher) = self.prepare().await?;

        let manager = StreamManager::new(
            self.transport.clone(),
            FilterParams::from(&config),
            self.stream_config,
        );
        let stream = manager.start(cancel.child_token());

        Pipeline::new(WatchList::from(&config), dispatcher)
            .run(stream, cancel)
            .await
    }
}
