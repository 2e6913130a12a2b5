//! Reconnect delays suggested by the stream provider.
//!
//! Network-level failures back off linearly; HTTP-level failures back off
//! exponentially. There is no attempt cap: the manager retries forever.

use std::time::Duration;

/// Class of failure that ended (or prevented) a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Http,
}

/// Back-off schedule parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub network_step: Duration,
    pub network_max: Duration,
    pub http_initial: Duration,
    pub http_max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            network_step: Duration::from_millis(250),
            network_max: Duration::from_secs(16),
            http_initial: Duration::from_secs(5),
            http_max: Duration::from_secs(320),
        }
    }
}

/// Running back-off state for one stream.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    network: Duration,
    http: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            network: Duration::ZERO,
            http: Duration::ZERO,
        }
    }

    /// Delay before the next attempt after a failure of `kind`.
    pub fn next_delay(&mut self, kind: FailureKind) -> Duration {
        match kind {
            FailureKind::Network => {
                self.network = (self.network + self.policy.network_step).min(self.policy.network_max);
                self.network
            }
            FailureKind::Http => {
                self.http = if self.http.is_zero() {
                    self.policy.http_initial
                } else {
                    (self.http * 2).min(self.policy.http_max)
                };
                self.http
            }
        }
    }

    /// Forget previous failures after a successful handshake.
    pub fn reset(&mut self) {
        self.network = Duration::ZERO;
        self.http = Duration::ZERO;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
