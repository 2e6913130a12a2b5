//! Dispatch orchestration.
//!
//! Each post observed on the stream is filtered, classified, rendered and
//! dispatched before the next one is taken, so notifications are delivered
//! in stream order.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::filter::WatchList;
use crate::notification::{Notification, render};
use crate::post::RawPost;
use crate::shape::{RelationshipShape, classify};
use crate::stream::StreamHandle;

/// Errors from delivering one notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The chat service refused the message
    #[error("Message rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Still rate limited after retrying
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// The request could not be sent
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    pub fn transport(msg: impl ToString) -> Self {
        Self::Transport(msg.to_string())
    }
}

/// Delivers rendered notifications to the resolved destination channel.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Identifier of the destination channel.
    fn channel_id(&self) -> &str;

    /// Deliver one notification.
    async fn dispatch(&self, notification: &Notification) -> std::result::Result<(), DispatchError>;
}

/// What happened to one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Author not on the watchlist
    Dropped,
    Dispatched,
    /// Dispatch failed; the post is not retried
    Failed,
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub received: u64,
    pub accepted: u64,
    pub dispatched: u64,
    pub failed: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: PostOutcome) {
        self.received += 1;
        match outcome {
            PostOutcome::Dropped => {}
            PostOutcome::Dispatched => {
                self.accepted += 1;
                self.dispatched += 1;
            }
            PostOutcome::Failed => {
                self.accepted += 1;
                self.failed += 1;
            }
        }
    }
}

/// Filter, classify, render and dispatch.
pub struct Pipeline {
    watchlist: WatchList,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Pipeline {
    pub fn new(watchlist: WatchList, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            watchlist,
            dispatcher,
        }
    }

    /// Classify and render a post, or `None` if it should not produce a
    /// notification.
    pub fn prepare(&self, post: &RawPost) -> Option<(RelationshipShape, Notification)> {
        // Unwatched authors are dropped silently.
        if !self.watchlist.accept(post) {
            return None;
        }

        let shape = classify(post);
        debug!(
            id = %post.id,
            author = %post.author.screen_name,
            shape = %shape,
            reply = post.is_reply(),
            links = post.has_links(),
            sensitive = post.possibly_sensitive,
            "Accepted post"
        );
        Some((shape, render(post, shape)))
    }

    /// Process one post to completion.
    pub async fn handle_post(&self, post: &RawPost) -> PostOutcome {
        let Some((shape, notification)) = self.prepare(post) else {
            return PostOutcome::Dropped;
        };

        match self.dispatcher.dispatch(&notification).await {
            Ok(()) => {
                info!(
                    id = %post.id,
                    shape = %shape,
                    channel = %self.dispatcher.channel_id(),
                    "Dispatched notification: {}",
                    notification.title
                );
                PostOutcome::Dispatched
            }
            Err(e) => {
                error!(
                    id = %post.id,
                    channel = %self.dispatcher.channel_id(),
                    error = %e,
                    "Failed to dispatch notification"
                );
                PostOutcome::Failed
            }
        }
    }

    /// Consume the stream until cancellation, stream end or terminal failure.
    ///
    /// A post already taken from the stream is fully processed before
    /// cancellation is observed.
    pub async fn run(&self, mut stream: StreamHandle, cancel: CancellationToken) -> Result<PipelineStats> {
        let mut stats = PipelineStats::default();

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                next = stream.recv() => next,
            };

            match next {
                Some(Ok(post)) => stats.record(self.handle_post(&post).await),
                Some(Err(e)) => break Err(Error::from(e)),
                None => break Ok(()),
            }
        };

        stream.join().await;
        info!(
            received = stats.received,
            accepted = stats.accepted,
            dispatched = stats.dispatched,
            failed = stats.failed,
            "Pipeline stopped"
        );
        outcome.map(|()| stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Author;
    use crate::stream::{
        FilterParams, MessageStream, StreamConfig, StreamManager, StreamTransport, TransportError,
    };
    use chrono::Utc;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait]
    impl Dispatcher for Recorder {
        fn channel_id(&self) -> &str {
            "42"
        }

        async fn dispatch(&self, notification: &Notification) -> std::result::Result<(), DispatchError> {
            if self.fail {
                return Err(DispatchError::Rejected {
                    status: 403,
                    body: "Missing Access".into(),
                });
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn post(id: &str, author_id: &str) -> RawPost {
        RawPost::new(id, Author::new(author_id, "Alice", "alice"), "hello", Utc::now())
    }

    #[tokio::test]
    async fn test_watched_post_is_dispatched() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = Pipeline::new(WatchList::new(["100"]), recorder.clone());

        assert_eq!(pipeline.handle_post(&post("1", "100")).await, PostOutcome::Dispatched);
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Alice just tweeted:");
    }

    #[tokio::test]
    async fn test_unwatched_post_is_dropped() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = Pipeline::new(WatchList::new(["100"]), recorder.clone());

        assert!(pipeline.prepare(&post("1", "200")).is_none());
        assert_eq!(pipeline.handle_post(&post("1", "200")).await, PostOutcome::Dropped);
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_reported() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let pipeline = Pipeline::new(WatchList::new(["100"]), recorder);
        assert_eq!(pipeline.handle_post(&post("1", "100")).await, PostOutcome::Failed);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = PipelineStats::default();
        stats.record(PostOutcome::Dropped);
        stats.record(PostOutcome::Dispatched);
        stats.record(PostOutcome::Failed);
        assert_eq!(
            stats,
            PipelineStats {
                received: 3,
                accepted: 2,
                dispatched: 1,
                failed: 1,
            }
        );
    }

    /// Accepts the connection and never sends anything.
    struct IdleTransport;

    #[async_trait]
    impl StreamTransport for IdleTransport {
        async fn connect(&self, _filter: &FilterParams) -> std::result::Result<MessageStream, TransportError> {
            Ok(futures::stream::pending().boxed())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_after_its_own_cancellation() {
        let manager = StreamManager::new(
            Arc::new(IdleTransport),
            FilterParams::default(),
            StreamConfig::default(),
        );
        let stream_cancel = CancellationToken::new();
        let handle = manager.start(stream_cancel.clone());

        let pipeline = Pipeline::new(WatchList::new(["100"]), Arc::new(Recorder::default()));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let stats = tokio::time::timeout(Duration::from_secs(3), pipeline.run(handle, cancel))
            .await
            .expect("pipeline should stop after cancellation")
            .unwrap();
        assert_eq!(stats, PipelineStats::default());
        assert!(!stream_cancel.is_cancelled());
    }
}
