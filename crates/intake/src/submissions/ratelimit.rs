//! Sliding-window rate limiting per client address.
//!
//! Each address keeps the timestamps of its requests inside the window;
//! stale entries are evicted lazily on every check. An optional shared
//! counter backend keeps multi-instance deployments roughly consistent, but
//! its failures degrade silently to the local window so the limiter never
//! fails a request on its own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Cross-instance counter backend (e.g. a network cache). Best effort: the
/// local window remains the source of truth for the decision.
pub trait SharedCounter: Send + Sync {
    fn increment(&self, key: &str, window: Duration) -> Result<u64, SharedCounterError>;
}

#[derive(Debug, thiserror::Error)]
#[error("shared counter unavailable: {0}")]
pub struct SharedCounterError(pub String);

pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    seen: DashMap<String, Vec<Instant>>,
    shared: Option<Arc<dyn SharedCounter>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: config.window,
            max_requests: config.max_requests,
            seen: DashMap::new(),
            shared: None,
        }
    }

    pub fn with_shared(mut self, shared: Arc<dyn SharedCounter>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Whether a request from `address` is allowed right now.
    ///
    /// A rejected request does not consume a slot: only allowed requests are
    /// appended to the window, so earlier traffic is never retroactively
    /// penalized by a burst of rejections.
    pub fn allow(&self, address: &str) -> bool {
        let now = Instant::now();
        let mut timestamps = self.seen.entry(address.to_string()).or_default();
        timestamps.retain(|at| now.duration_since(*at) < self.window);
        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push(now);
        drop(timestamps);

        if let Some(shared) = &self.shared {
            if let Err(err) = shared.increment(address, self.window) {
                tracing::debug!(%err, "shared rate-limit backend unavailable, local window only");
            }
        }
        true
    }

    /// Requests currently counted against `address`.
    pub fn in_window(&self, address: &str) -> usize {
        let now = Instant::now();
        self.seen
            .get(address)
            .map(|timestamps| {
                timestamps
                    .iter()
                    .filter(|at| now.duration_since(**at) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }
}
