//! Request Rate Limiter
//!
//! Per-identifier fixed-window throttle in front of the chat pipeline.
//! The counter store primitive is an atomic increment-and-check, never a
//! read-then-write, so concurrent calls with the same identifier cannot
//! slip past the limit.
//!
//! Failure policy: fail closed. A counter-store error propagates out of
//! [`RateLimiter::allow`] and the pipeline aborts the turn, rather than
//! letting unmetered traffic through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::SdkResult;

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,                // 10 requests
            window: Duration::from_secs(10), // per 10 seconds
        }
    }
}

/// Store interface for windowed counters.
///
/// `increment` must atomically bump the identifier's counter for the
/// current window and return the post-increment count, resetting the
/// counter when `window` has elapsed since the window started.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, identifier: &str, window: Duration) -> SdkResult<u32>;
}

/// Per-identifier counter state: request count since `window_start`.
#[derive(Debug)]
struct CounterEntry {
    count: u32,
    window_start: Instant,
}

/// In-memory counter store.
///
/// The whole increment runs under one write lock; concurrent callers
/// observe strictly increasing counts.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: RwLock<HashMap<String, CounterEntry>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, identifier: &str, window: Duration) -> SdkResult<u32> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let entry = entries
            .entry(identifier.to_string())
            .or_insert(CounterEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        Ok(entry.count)
    }
}

/// Per-identifier request throttle.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Check whether a request under `identifier` is permitted.
    ///
    /// The identifier is caller-supplied and not validated further.
    pub async fn allow(&self, identifier: &str) -> SdkResult<bool> {
        let count = self
            .store
            .increment(identifier, self.config.window)
            .await?;
        let permitted = count <= self.config.max_requests;
        if !permitted {
            tracing::warn!(identifier, count, "rate limit exceeded");
        }
        Ok(permitted)
    }
}
