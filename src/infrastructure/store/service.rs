//! Atomic key-value store trait and error types.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Errors that can occur during store operations.
#[derive(Debug)]
pub enum StoreError {
    ConnectionError(String),
    OperationError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConnectionError(e) => write!(f, "Store connection error: {}", e),
            Self::OperationError(e) => write!(f, "Store operation error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared store holding cache entries, rate-limit counters and pending-fetch
/// bookkeeping.
///
/// Every compound operation (increment-and-expire, increment-check-decrement,
/// set-if-absent, compare-and-delete) must be a single atomic operation at the
/// store, because several process instances coordinate through it.
///
/// # Implementations
///
/// - [`crate::infrastructure::store::RedisStore`] - Redis-backed, multi-instance safe
/// - [`crate::infrastructure::store::MemoryStore`] - Process-local, for tests and single-node runs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` if the key exists and has not expired
    /// - `Ok(None)` otherwise
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a value that expires after `ttl`, replacing any previous value.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Writes a value only if the key is absent.
    ///
    /// Returns `true` if this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Deletes a key only if it currently holds `expected`.
    ///
    /// Returns `true` if the key was deleted.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Deletes a key unconditionally.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Increments a fixed-window counter.
    ///
    /// The expiry of `window` is set only by the increment that creates the
    /// counter, so the window boundary never slides. Returns the new count.
    async fn increment_window(&self, key: &str, window: Duration) -> StoreResult<u64>;

    /// Takes one slot of a bounded counter.
    ///
    /// Increments the counter and, if the result exceeds `max`, undoes the
    /// increment and returns `false`. The counter expiry is refreshed to `ttl`
    /// on every call so slots leaked by a crashed process eventually free up.
    async fn acquire_slot(&self, key: &str, max: u64, ttl: Duration) -> StoreResult<bool>;

    /// Returns one slot taken by [`KeyValueStore::acquire_slot`].
    ///
    /// The counter never goes below zero.
    async fn release_slot(&self, key: &str) -> StoreResult<()>;

    /// Checks if the store backend is reachable.
    async fn health_check(&self) -> bool;
}
