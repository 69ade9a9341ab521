//! Fixed-window rate limiting for outbound provider calls.
//!
//! Counters live in the shared [`KeyValueStore`], so every process instance
//! draws from the same budget. Bursts across a window boundary are accepted.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use crate::infrastructure::store::KeyValueStore;

/// Rate-limit budget for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub provider: String,
    pub max_requests: u64,
    pub window: Duration,
}

impl RateLimitBucket {
    pub fn new(provider: impl Into<String>, max_requests: u64, window: Duration) -> Self {
        Self {
            provider: provider.into(),
            max_requests,
            window,
        }
    }

    /// Store key holding this bucket's counter.
    pub fn key(&self) -> String {
        format!("ratelimit:{}", self.provider)
    }
}

/// Store-backed fixed-window counter.
///
/// The limiter never retries or queues: a denied call is reported to the
/// caller immediately. Store errors are fail-open and only logged.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Consumes one request from the bucket.
    ///
    /// Returns `true` iff the count after incrementing is within `max`.
    pub async fn try_consume(&self, bucket_key: &str, max: u64, window: Duration) -> bool {
        match self.store.increment_window(bucket_key, window).await {
            Ok(count) if count <= max => {
                debug!(bucket = bucket_key, count, max, "rate limit consumed");
                true
            }
            Ok(count) => {
                warn!(bucket = bucket_key, count, max, "rate limit exceeded");
                counter!("rate_limit_rejections_total", "bucket" => bucket_key.to_string())
                    .increment(1);
                false
            }
            Err(e) => {
                warn!(bucket = bucket_key, "rate limiter store error, allowing call: {}", e);
                true
            }
        }
    }

    /// Consumes one request from a provider bucket.
    pub async fn try_consume_bucket(&self, bucket: &RateLimitBucket) -> bool {
        self.try_consume(&bucket.key(), bucket.max_requests, bucket.window)
            .await
    }
}
