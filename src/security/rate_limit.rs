//! Fixed-window rate limiting keyed by client IP.
//!
//! Counters live behind the `CounterStore` trait so the in-memory table can be
//! swapped for a shared external store without touching the policy gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ProxyError;
use crate::lifecycle::ShutdownListener;

/// Longest accepted rate-limit window: one year.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Storage for per-key request counters.
pub trait CounterStore: Send + Sync {
    /// Count one request for `key` and return the count within the current
    /// window. A key whose window has elapsed restarts at 1.
    fn increment(&self, key: &str, window: Duration) -> u64;

    /// Drop records whose window has elapsed. Returns how many were removed.
    fn evict_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u64,
    reset_at: Instant,
}

/// Process-local counter table.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    records: DashMap<String, WindowRecord>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_at(&self, key: &str, window: Duration, now: Instant) -> u64 {
        // The entry guard holds the shard lock, so increments on one key are serialized.
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| WindowRecord {
                count: 0,
                reset_at: window_end(now, window),
            });

        if now >= record.reset_at {
            record.count = 0;
            record.reset_at = window_end(now, window);
        }

        record.count += 1;
        record.count
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.reset_at > now);
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `now + window`, capped at [`MAX_WINDOW_SECS`] when the sum overflows `Instant`.
fn window_end(now: Instant, window: Duration) -> Instant {
    now.checked_add(window)
        .unwrap_or_else(|| now + Duration::from_secs(MAX_WINDOW_SECS))
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, key: &str, window: Duration) -> u64 {
        self.increment_at(key, window, Instant::now())
    }

    fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }
}

/// Threshold check on top of a counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    /// Returns `None` when limiting is disabled (threshold 0).
    pub fn from_config(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Option<Self> {
        if !config.enabled() {
            return None;
        }
        Some(Self {
            store,
            limit: config.requests_per_window,
            window: Duration::from_secs(config.window_secs),
        })
    }

    pub fn check(&self, client_ip: &str) -> Result<(), ProxyError> {
        let count = self.store.increment(client_ip, self.window);
        if count > self.limit {
            tracing::warn!(client = %client_ip, count, limit = self.limit, "Rate limit exceeded");
            return Err(ProxyError::RateLimited);
        }
        Ok(())
    }
}

/// Periodically evict expired records until shutdown.
pub async fn run_eviction(
    store: Arc<dyn CounterStore>,
    interval: Duration,
    mut shutdown: ShutdownListener,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.evict_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Evicted expired rate-limit records");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Rate-limit eviction stopped");
                break;
            }
        }
    }
}
