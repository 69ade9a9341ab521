//! Process-local store implementation for tests or Redis-less deployments.

use super::service::{KeyValueStore, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Writes between two full passes that drop expired keys nobody reads again.
const SWEEP_EVERY: usize = 1024;

struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn expiring(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
struct Entries {
    slots: HashMap<String, Slot>,
    writes_since_sweep: usize,
}

impl Entries {
    /// Returns the slot under `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut Slot> {
        if self.slots.get(key).is_some_and(|slot| !slot.is_live(Instant::now())) {
            self.slots.remove(key);
        }
        self.slots.get_mut(key)
    }

    fn insert(&mut self, key: &str, slot: Slot) {
        self.slots.insert(key.to_string(), slot);

        self.writes_since_sweep += 1;
        if self.writes_since_sweep >= SWEEP_EVERY {
            let now = Instant::now();
            self.slots.retain(|_, slot| slot.is_live(now));
            self.writes_since_sweep = 0;
        }
    }

    fn counter(&mut self, key: &str) -> i64 {
        self.live(key)
            .and_then(|slot| slot.value.parse().ok())
            .unwrap_or(0)
    }
}

/// A store that keeps everything in this process.
///
/// Every operation runs under one mutex, which makes the compound operations
/// atomic for callers in the same process. It does not coordinate separate
/// process instances. Expired keys are dropped when next touched, and by a
/// periodic sweep.
///
/// # Use Cases
///
/// - Development environments without Redis
/// - Unit and integration tests
/// - Fallback when the Redis connection fails at startup
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    /// Creates an empty MemoryStore.
    pub fn new() -> Self {
        debug!("Using MemoryStore (process-local coordination only)");
        Self {
            entries: Mutex::new(Entries::default()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn stored_keys(&self) -> usize {
        self.entries().slots.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries().live(key).map(|slot| slot.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.entries().insert(key, Slot::expiring(value, ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut entries = self.entries();
        if entries.live(key).is_some() {
            return Ok(false);
        }
        entries.insert(key, Slot::expiring(value, ttl));
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut entries = self.entries();
        if entries.live(key).is_some_and(|slot| slot.value == expected) {
            entries.slots.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries().slots.remove(key);
        Ok(())
    }

    async fn increment_window(&self, key: &str, window: Duration) -> StoreResult<u64> {
        let mut entries = self.entries();
        let count = entries.counter(key) + 1;
        let expires_at = match entries.live(key) {
            Some(slot) => slot.expires_at,
            None => Some(Instant::now() + window),
        };
        entries.insert(
            key,
            Slot {
                value: count.to_string(),
                expires_at,
            },
        );
        Ok(count.max(0) as u64)
    }

    async fn acquire_slot(&self, key: &str, max: u64, ttl: Duration) -> StoreResult<bool> {
        let mut entries = self.entries();
        let current = entries.counter(key);
        let admitted = current < max as i64;
        let count = if admitted { current + 1 } else { current };
        entries.insert(key, Slot::expiring(count.to_string(), ttl));
        Ok(admitted)
    }

    async fn release_slot(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries();
        let count = entries.counter(key) - 1;
        if count <= 0 {
            entries.slots.remove(key);
        } else if let Some(slot) = entries.live(key) {
            slot.value = count.to_string();
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
