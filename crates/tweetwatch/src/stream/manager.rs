//! Stream manager and its connection task.
//!
//! The manager spawns a single task that owns the only connection:
//! - connects, and reconnects with provider-suggested delays
//! - forwards posts into a bounded channel that outlives each connection
//! - reports transitions, limit notices and warnings as [`StreamEvent`]s
//! - stops on cancellation or on a terminal failure

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{
    Backoff, ConnectionState, FilterParams, MessageStream, StreamConfig, StreamError,
    StreamEvent, StreamTransport, TransportError,
};
use crate::codec::StreamMessage;
use crate::post::RawPost;

/// Broadcast capacity for stream events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

type PostResult = Result<RawPost, StreamError>;

/// Owns the configuration of the stream until it is started.
pub struct StreamManager {
    transport: Arc<dyn StreamTransport>,
    filter: FilterParams,
    config: StreamConfig,
    event_tx: broadcast::Sender<StreamEvent>,
    state_tx: watch::Sender<ConnectionState>,
}

impl StreamManager {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        filter: FilterParams,
        config: StreamConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            transport,
            filter,
            config,
            event_tx,
            state_tx,
        }
    }

    /// Subscribe to stream events. Subscribe before [`start`](Self::start) to
    /// observe the initial transition.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_tx.subscribe()
    }

    /// Spawn the connection task. It stops when `cancel` fires or when the
    /// returned handle is joined.
    pub fn start(self, cancel: CancellationToken) -> StreamHandle {
        let (post_tx, post_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let state_rx = self.state_tx.subscribe();
        let cancel = cancel.child_token();

        let task = ConnectionTask {
            transport: self.transport,
            filter: self.filter,
            config: self.config,
            backoff: Backoff::new(self.config.backoff),
            attempt: 0,
            event_tx: self.event_tx,
            state_tx: self.state_tx,
            post_tx,
            cancel: cancel.clone(),
        };

        StreamHandle {
            post_rx,
            state_rx,
            cancel,
            task: tokio::spawn(task.run()),
        }
    }
}

/// Consumer side of a started stream.
pub struct StreamHandle {
    post_rx: mpsc::Receiver<PostResult>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Next post, in arrival order.
    ///
    /// Returns `Some(Err(_))` once on a terminal failure and `None` after the
    /// connection task has stopped.
    pub async fn recv(&mut self) -> Option<PostResult> {
        self.post_rx.recv().await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Close the connection and wait for the connection task to stop.
    pub async fn join(self) {
        let Self {
            post_rx,
            cancel,
            task,
            ..
        } = self;
        cancel.cancel();
        drop(post_rx);
        if let Err(e) = task.await {
            error!(error = %e, "Stream task panicked");
        }
    }
}

/// How a connected session ended.
enum SessionEnd {
    Cancelled,
    ConsumerGone,
    Lost(TransportError),
}

struct ConnectionTask {
    transport: Arc<dyn StreamTransport>,
    filter: FilterParams,
    config: StreamConfig,
    backoff: Backoff,
    /// Failed attempts since a session last delivered data
    attempt: u32,
    event_tx: broadcast::Sender<StreamEvent>,
    state_tx: watch::Sender<ConnectionState>,
    post_tx: mpsc::Sender<PostResult>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(mut self) {
        info!(
            follow = self.filter.follow.len(),
            track = self.filter.track.len(),
            "Connecting to stream..."
        );
        self.emit(StreamEvent::Connecting);

        loop {
            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.transport.connect(&self.filter) => result,
            };

            let failure = match connected {
                Ok(stream) => {
                    info!("Connected to stream");
                    self.emit(StreamEvent::Connected);

                    match self.pump(stream).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::ConsumerGone => {
                            debug!("Stream consumer dropped, closing connection");
                            break;
                        }
                        SessionEnd::Lost(e) => e,
                    }
                }
                Err(e) => e,
            };

            if failure.is_terminal() {
                error!(error = %failure, "Stream failed");
                self.emit(StreamEvent::Failed {
                    error: failure.to_string(),
                });
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = self.post_tx.send(Err(StreamError::Terminal(failure))) => {}
                }
                return;
            }

            self.attempt += 1;
            let attempt = self.attempt;
            let delay = self.backoff.next_delay(failure.failure_kind());
            warn!(
                attempt,
                error = %failure,
                "Reconnecting to stream in {}ms...",
                delay.as_millis()
            );
            self.emit(StreamEvent::Reconnecting {
                attempt,
                delay,
                reason: failure.to_string(),
            });

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.emit(StreamEvent::Disconnected);
        info!("Stream connection closed");
    }

    /// Forward messages of one connected session until it ends.
    ///
    /// Back-off is reset once the session delivers its first line.
    async fn pump(&mut self, mut stream: MessageStream) -> SessionEnd {
        let stall_timeout = self.config.stall_timeout;
        let mut delivered = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
                next = tokio::time::timeout(stall_timeout, stream.next()) => next,
            };

            let line = match next {
                Err(_) => {
                    return SessionEnd::Lost(TransportError::network(format!(
                        "no data received for {}s",
                        stall_timeout.as_secs()
                    )));
                }
                Ok(None) => {
                    return SessionEnd::Lost(TransportError::network("stream closed by provider"));
                }
                Ok(Some(Err(e))) if !matches!(e, TransportError::Decode(_)) => {
                    return SessionEnd::Lost(e);
                }
                Ok(Some(line)) => line,
            };

            if !delivered {
                delivered = true;
                self.attempt = 0;
                self.backoff.reset();
            }

            let message = match line {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable stream message");
                    continue;
                }
            };

            match message {
                StreamMessage::Post(post) => {
                    trace!(id = %post.id, author = %post.author.id, "Post received");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
                        sent = self.post_tx.send(Ok(*post)) => {
                            if sent.is_err() {
                                return SessionEnd::ConsumerGone;
                            }
                        }
                    }
                }
                StreamMessage::KeepAlive => trace!("Keep-alive"),
                StreamMessage::Limit { undelivered } => {
                    info!(undelivered, "Stream limit notice");
                    self.emit(StreamEvent::Limit { undelivered });
                }
                StreamMessage::Warning {
                    code,
                    message,
                    percent_full,
                } => {
                    warn!(code = %code, ?percent_full, "Stream warning: {}", message);
                    self.emit(StreamEvent::Warning { code, message });
                }
                StreamMessage::Delete { id, user_id } => {
                    debug!(id = %id, user_id = %user_id, "Post deleted upstream");
                }
                StreamMessage::Disconnect {
                    code,
                    stream_name,
                    reason,
                } => {
                    let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                    warn!(
                        code,
                        stream = stream_name.as_deref().unwrap_or("-"),
                        reason = %reason,
                        "Provider disconnect notice"
                    );
                    return SessionEnd::Lost(TransportError::Disconnect { code, reason });
                }
                StreamMessage::Other(kind) => debug!(kind = %kind, "Ignoring stream notice"),
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        if let Some(state) = event.state() {
            self.state_tx.send_replace(state);
        }
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
