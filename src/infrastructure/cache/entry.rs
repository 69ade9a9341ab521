//! Cache entry encoding and per-stage cache policy.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lookup::Lookup;

/// Which TTL an entry was stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    Positive,
    Negative,
}

/// A cached stage result.
///
/// A negative entry has the same shape as a positive one; only its
/// `Lookup::NotFound` value and TTL class differ. Entries are never mutated,
/// only replaced under the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: Lookup<T>,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_class: TtlClass,
}

impl<T> CacheEntry<T> {
    /// Stamps a value with the TTL its class gets under `policy`.
    pub fn new(value: Lookup<T>, policy: &CachePolicy) -> Self {
        let ttl_class = if value.is_found() {
            TtlClass::Positive
        } else {
            TtlClass::Negative
        };
        let stored_at = Utc::now();
        let expires_at = TimeDelta::from_std(policy.ttl_for(ttl_class))
            .ok()
            .and_then(|ttl| stored_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            stored_at,
            expires_at,
            ttl_class,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.ttl_class == TtlClass::Negative
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Caching rules for one resolution stage.
///
/// Each stage (address, geocode, final coordinate) uses its own `prefix`, so
/// the three caches are independent namespaces in the same store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub prefix: String,
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
    /// Ceiling on concurrent cache-miss fetches in this namespace, across keys
    /// and process instances.
    pub max_pending_fetches: u64,
    /// Deadline for one fetch, including waiting on another instance's fetch.
    pub fetch_timeout: Duration,
}

impl CachePolicy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            positive_ttl: Duration::from_secs(30 * 24 * 3600),
            negative_ttl: Duration::from_secs(3600),
            max_pending_fetches: 100,
            fetch_timeout: Duration::from_secs(8),
        }
    }

    pub fn with_ttls(mut self, positive: Duration, negative: Duration) -> Self {
        self.positive_ttl = positive;
        self.negative_ttl = negative;
        self
    }

    pub fn with_max_pending_fetches(mut self, max: u64) -> Self {
        self.max_pending_fetches = max;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Positive => self.positive_ttl,
            TtlClass::Negative => self.negative_ttl,
        }
    }

    /// Store key of the entry for a normalized query key.
    pub fn entry_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Store key of the cross-instance fetch lock for a query key.
    pub fn lock_key(&self, key: &str) -> String {
        format!("lock:{}:{}", self.prefix, key)
    }

    /// Store key of the namespace's pending-fetch counter.
    pub fn pending_counter_key(&self) -> String {
        format!("pending:{}", self.prefix)
    }

    /// Expiry refreshed on the pending counter, so slots leaked by a crashed
    /// instance free up.
    pub fn slot_ttl(&self) -> Duration {
        self.fetch_timeout * 2
    }
}
