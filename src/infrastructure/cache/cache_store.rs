//! Cache-aside store with single-flight fetches and negative caching.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::entry::{CacheEntry, CachePolicy};
use crate::domain::errors::LookupError;
use crate::domain::lookup::Lookup;
use crate::infrastructure::store::{KeyValueStore, StoreResult};

/// How often a process waiting on another instance's fetch re-reads the cache.
pub const DEFAULT_PEER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A settled fetch, shared by every caller that joined it. The output is the
/// JSON encoding of `Lookup<T>` so the map does not depend on `T`.
type PendingFetch = Shared<BoxFuture<'static, Result<String, LookupError>>>;

/// A fetch in flight in this process and the callers still waiting on it.
struct InFlight {
    owner: String,
    result: PendingFetch,
    waiters: usize,
    cancel: CancellationToken,
}

type PendingMap = Arc<Mutex<HashMap<String, InFlight>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, InFlight>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Registration of one caller on an [`InFlight`] fetch.
///
/// Dropping the last registration cancels the fetch and unlists it, so a
/// later caller starts over instead of joining abandoned work.
struct Waiter {
    pending: PendingMap,
    entry_key: String,
    owner: String,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let mut pending = lock(&self.pending);
        let Some(in_flight) = pending.get_mut(&self.entry_key) else {
            return;
        };
        if in_flight.owner != self.owner {
            return;
        }

        in_flight.waiters -= 1;
        if in_flight.waiters == 0 {
            debug!(key = %self.entry_key, "No callers left, cancelling fetch");
            in_flight.cancel.cancel();
            pending.remove(&self.entry_key);
        }
    }
}

/// Joins the fetch listed under `entry_key`, if any. Must be called with the
/// map locked.
fn join(
    pending: &PendingMap,
    map: &mut HashMap<String, InFlight>,
    entry_key: &str,
) -> Option<(PendingFetch, Waiter)> {
    let in_flight = map.get_mut(entry_key)?;
    in_flight.waiters += 1;

    let waiter = Waiter {
        pending: Arc::clone(pending),
        entry_key: entry_key.to_string(),
        owner: in_flight.owner.clone(),
    };
    Some((in_flight.result.clone(), waiter))
}

/// Cache-aside layer over a [`KeyValueStore`].
///
/// # Guarantees
///
/// - A warm entry (positive or negative) is returned without running the fetch.
/// - Concurrent callers for the same key share exactly one fetch. Within a
///   process they await the same future; across processes the owner holds a
///   store lock and the others poll the cache until the entry appears.
/// - New fetches are admitted only while the namespace's pending counter is
///   below `max_pending_fetches`; otherwise the caller gets
///   [`LookupError::ServiceOverload`] without waiting.
/// - A fetch runs under `fetch_timeout`. On expiry it is cancelled, nothing is
///   cached and callers get [`LookupError::TimeoutExceeded`].
/// - A fetch whose callers have all been cancelled or dropped is cancelled too.
/// - However a fetch ends, its lock, counter slot and pending entry are
///   released before its callers resume.
///
/// Store errors degrade open: failed reads are misses, failed writes are only
/// logged.
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    pending: PendingMap,
    peer_poll_interval: Duration,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            pending: Arc::new(Mutex::new(HashMap::new())),
            peer_poll_interval: DEFAULT_PEER_POLL_INTERVAL,
        }
    }

    pub fn with_peer_poll_interval(mut self, interval: Duration) -> Self {
        self.peer_poll_interval = interval;
        self
    }

    /// Number of fetches currently in flight in this process.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Reads an unexpired entry without fetching.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        policy: &CachePolicy,
    ) -> Option<CacheEntry<T>> {
        read_entry(self.store.as_ref(), &policy.entry_key(key)).await
    }

    /// Removes an entry so the next lookup fetches again.
    pub async fn invalidate(&self, key: &str, policy: &CachePolicy) -> StoreResult<()> {
        self.store.delete(&policy.entry_key(key)).await
    }

    /// Returns the cached result for `key`, running `fetch` on a miss.
    ///
    /// `fetch` receives a token that is cancelled when the deadline expires
    /// or when no caller is waiting any more. A `Lookup::NotFound` result is
    /// cached with the negative TTL; errors are never cached.
    ///
    /// # Errors
    ///
    /// - [`LookupError::ServiceOverload`] if the pending-fetch ceiling is reached
    /// - [`LookupError::TimeoutExceeded`] if the fetch misses its deadline
    /// - Any error returned by `fetch` itself
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        policy: &CachePolicy,
        fetch: F,
    ) -> Result<Lookup<T>, LookupError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Lookup<T>, LookupError>> + Send + 'static,
    {
        self.get_or_fetch_with(key, policy, &CancellationToken::new(), fetch)
            .await
    }

    /// Like [`CacheStore::get_or_fetch`], but stops waiting once `parent` is
    /// cancelled. The shared fetch keeps running while other callers wait on
    /// it and is cancelled when the last one leaves.
    ///
    /// # Errors
    ///
    /// As [`CacheStore::get_or_fetch`], plus [`LookupError::TimeoutExceeded`]
    /// when `parent` fires first.
    pub async fn get_or_fetch_with<T, F, Fut>(
        &self,
        key: &str,
        policy: &CachePolicy,
        parent: &CancellationToken,
        fetch: F,
    ) -> Result<Lookup<T>, LookupError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Lookup<T>, LookupError>> + Send + 'static,
    {
        let entry_key = policy.entry_key(key);

        if let Some(entry) = read_entry::<T>(self.store.as_ref(), &entry_key).await {
            debug!(key = %entry_key, negative = entry.is_negative(), "Cache HIT");
            counter!("cache_hits_total", "namespace" => policy.prefix.clone()).increment(1);
            return Ok(entry.value);
        }

        debug!(key = %entry_key, "Cache MISS");
        counter!("cache_misses_total", "namespace" => policy.prefix.clone()).increment(1);

        let joined = join(&self.pending, &mut lock(&self.pending), &entry_key);
        let (in_flight, _waiter) = match joined {
            Some(joined) => {
                debug!(key = %entry_key, "Joining in-flight fetch");
                joined
            }
            None => self.start_fetch(key, policy, fetch).await?,
        };

        let raw = tokio::select! {
            biased;
            _ = parent.cancelled() => {
                debug!(key = %entry_key, "Caller cancelled, leaving fetch");
                return Err(LookupError::TimeoutExceeded);
            }
            raw = in_flight => raw?,
        };

        decode(&raw)
    }

    async fn start_fetch<T, F, Fut>(
        &self,
        key: &str,
        policy: &CachePolicy,
        fetch: F,
    ) -> Result<(PendingFetch, Waiter), LookupError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Lookup<T>, LookupError>> + Send + 'static,
    {
        let counter_key = policy.pending_counter_key();
        let admitted = match self
            .store
            .acquire_slot(&counter_key, policy.max_pending_fetches, policy.slot_ttl())
            .await
        {
            Ok(admitted) => admitted,
            Err(e) => {
                warn!(namespace = %policy.prefix, "Pending counter unavailable, admitting fetch: {}", e);
                true
            }
        };

        if !admitted {
            warn!(
                namespace = %policy.prefix,
                max = policy.max_pending_fetches,
                "Pending fetch ceiling reached"
            );
            counter!("cache_overload_total", "namespace" => policy.prefix.clone()).increment(1);
            return Err(LookupError::ServiceOverload);
        }

        let entry_key = policy.entry_key(key);
        let (joined, raced) = {
            let mut pending = lock(&self.pending);
            match join(&self.pending, &mut pending, &entry_key) {
                Some(joined) => (joined, true),
                None => {
                    let owner = format!("{:016x}", rand::random::<u64>());
                    let cancel = CancellationToken::new();
                    let job = FetchJob {
                        store: Arc::clone(&self.store),
                        pending: Arc::clone(&self.pending),
                        key: key.to_string(),
                        owner: owner.clone(),
                        cancel: cancel.clone(),
                        policy: policy.clone(),
                        peer_poll_interval: self.peer_poll_interval,
                    };
                    let task = tokio::spawn(job.run(fetch));
                    let result = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(LookupError::Internal(format!("fetch task failed: {e}")))
                        })
                    }
                    .boxed()
                    .shared();

                    pending.insert(
                        entry_key.clone(),
                        InFlight {
                            owner: owner.clone(),
                            result: result.clone(),
                            waiters: 1,
                            cancel,
                        },
                    );
                    let waiter = Waiter {
                        pending: Arc::clone(&self.pending),
                        entry_key,
                        owner,
                    };
                    ((result, waiter), false)
                }
            }
        };

        // Another caller registered the key while the slot was being taken.
        if raced {
            release_slot(self.store.as_ref(), &counter_key).await;
        }

        Ok(joined)
    }
}

/// One cache-miss pipeline, run on its own task so release happens even if
/// every caller goes away.
struct FetchJob {
    store: Arc<dyn KeyValueStore>,
    pending: PendingMap,
    key: String,
    owner: String,
    cancel: CancellationToken,
    policy: CachePolicy,
    peer_poll_interval: Duration,
}

impl FetchJob {
    async fn run<T, F, Fut>(self, fetch: F) -> Result<String, LookupError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Lookup<T>, LookupError>> + Send + 'static,
    {
        let started = Instant::now();

        let work = tokio::time::timeout(self.policy.fetch_timeout, self.fetch_or_follow(fetch));
        let outcome = AssertUnwindSafe(work).catch_unwind().await;

        self.cancel.cancel();
        self.release().await;

        let latency_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(Ok(result)) => {
                debug!(
                    namespace = %self.policy.prefix,
                    key = %self.key,
                    latency_ms,
                    ok = result.is_ok(),
                    "Fetch settled"
                );
                result
            }
            Ok(Err(_elapsed)) => {
                warn!(
                    namespace = %self.policy.prefix,
                    key = %self.key,
                    timeout_ms = self.policy.fetch_timeout.as_millis() as u64,
                    "Fetch deadline exceeded"
                );
                Err(LookupError::TimeoutExceeded)
            }
            Err(_panic) => {
                error!(namespace = %self.policy.prefix, key = %self.key, "Fetch panicked");
                Err(LookupError::Internal("fetch panicked".to_string()))
            }
        }
    }

    /// Takes the cross-instance lock and fetches, or waits for the instance
    /// that holds it to fill the entry.
    async fn fetch_or_follow<T, F, Fut>(&self, fetch: F) -> Result<String, LookupError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<Lookup<T>, LookupError>>,
    {
        let entry_key = self.policy.entry_key(&self.key);
        let lock_key = self.policy.lock_key(&self.key);

        loop {
            match self
                .store
                .set_if_absent(&lock_key, &self.owner, self.policy.fetch_timeout)
                .await
            {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %lock_key, "Fetch lock unavailable, fetching anyway: {}", e);
                    break;
                }
            }

            if let Some(entry) = read_entry::<T>(self.store.as_ref(), &entry_key).await {
                debug!(key = %entry_key, "Entry filled by another instance");
                return encode(&entry.value);
            }

            debug!(key = %lock_key, "Another instance is fetching, waiting");
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(LookupError::TimeoutExceeded),
                _ = tokio::time::sleep(self.peer_poll_interval) => {}
            }
        }

        // A fetch that settled between the caller's miss and this lock has
        // already written the entry.
        if let Some(entry) = read_entry::<T>(self.store.as_ref(), &entry_key).await {
            debug!(key = %entry_key, "Entry filled while taking the lock");
            return encode(&entry.value);
        }

        let lookup = fetch(self.cancel.clone()).await?;
        if self.cancel.is_cancelled() {
            debug!(key = %entry_key, "Fetch cancelled, result not cached");
            return Err(LookupError::TimeoutExceeded);
        }

        let raw = encode(&lookup)?;
        self.write_entry(lookup).await;
        Ok(raw)
    }

    async fn write_entry<T: Serialize>(&self, lookup: Lookup<T>) {
        let entry = CacheEntry::new(lookup, &self.policy);
        let ttl = self.policy.ttl_for(entry.ttl_class);
        let entry_key = self.policy.entry_key(&self.key);

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key = %entry_key, "Failed to encode cache entry: {}", e);
                return;
            }
        };

        match self.store.set_with_ttl(&entry_key, &raw, ttl).await {
            Ok(()) => debug!(
                key = %entry_key,
                negative = entry.is_negative(),
                ttl_secs = ttl.as_secs(),
                "Cache SET"
            ),
            Err(e) => warn!(key = %entry_key, "Cache write failed: {}", e),
        }
    }

    async fn release(&self) {
        let lock_key = self.policy.lock_key(&self.key);
        if let Err(e) = self.store.delete_if_equals(&lock_key, &self.owner).await {
            warn!(key = %lock_key, "Failed to release fetch lock: {}", e);
        }

        release_slot(self.store.as_ref(), &self.policy.pending_counter_key()).await;

        let entry_key = self.policy.entry_key(&self.key);
        let mut pending = lock(&self.pending);
        if pending.get(&entry_key).is_some_and(|f| f.owner == self.owner) {
            pending.remove(&entry_key);
        }
    }
}

async fn release_slot(store: &dyn KeyValueStore, counter_key: &str) {
    if let Err(e) = store.release_slot(counter_key).await {
        warn!(key = counter_key, "Failed to release pending slot: {}", e);
    }
}

async fn read_entry<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Option<CacheEntry<T>> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, "Cache read failed, treating as miss: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<CacheEntry<T>>(&raw) {
        Ok(entry) if entry.is_expired(Utc::now()) => None,
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(key, "Discarding undecodable cache entry: {}", e);
            None
        }
    }
}

fn encode<T: Serialize>(lookup: &Lookup<T>) -> Result<String, LookupError> {
    serde_json::to_string(lookup)
        .map_err(|e| LookupError::Internal(format!("failed to encode lookup: {e}")))
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<Lookup<T>, LookupError> {
    serde_json::from_str(raw)
        .map_err(|e| LookupError::Internal(format!("failed to decode lookup: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Store whose first read returns what it saw only after `stall`.
    struct StalledFirstRead {
        inner: Arc<MemoryStore>,
        reads: AtomicUsize,
        stall: Duration,
    }

    #[async_trait]
    impl KeyValueStore for StalledFirstRead {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            let value = self.inner.get(key).await?;
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(self.stall).await;
            }
            Ok(value)
        }

        async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
            self.inner.set_with_ttl(key, value, ttl).await
        }

        async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
            self.inner.set_if_absent(key, value, ttl).await
        }

        async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
            self.inner.delete_if_equals(key, expected).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key).await
        }

        async fn increment_window(&self, key: &str, window: Duration) -> StoreResult<u64> {
            self.inner.increment_window(key, window).await
        }

        async fn acquire_slot(&self, key: &str, max: u64, ttl: Duration) -> StoreResult<bool> {
            self.inner.acquire_slot(key, max, ttl).await
        }

        async fn release_slot(&self, key: &str) -> StoreResult<()> {
            self.inner.release_slot(key).await
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    async fn never_called<T>(_: CancellationToken) -> Result<Lookup<T>, LookupError> {
        panic!("fetch must not run")
    }

    async fn panicking(_: CancellationToken) -> Result<Lookup<u8>, LookupError> {
        panic!("boom")
    }

    fn policy() -> CachePolicy {
        CachePolicy::new("test")
            .with_ttls(Duration::from_secs(600), Duration::from_secs(60))
            .with_max_pending_fetches(10)
            .with_fetch_timeout(Duration::from_millis(500))
    }

    fn cache() -> (Arc<MemoryStore>, Arc<CacheStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(store.clone()).with_peer_poll_interval(Duration::from_millis(5));
        (store, Arc::new(cache))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let (_, cache) = cache();
        let policy = policy();
        let calls = Arc::new(AtomicUsize::new(0));

        let lookups = (0..16).map(|_| {
            let cache = cache.clone();
            let policy = policy.clone();
            let calls = calls.clone();
            async move {
                cache
                    .get_or_fetch("01310100", &policy, move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(Lookup::Found("paulista".to_string()))
                    })
                    .await
            }
        });
        let results = futures::future::join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(
            results
                .iter()
                .all(|r| r == &Ok(Lookup::Found("paulista".to_string())))
        );
        assert_eq!(cache.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_warm_entry_skips_fetch() {
        let (_, cache) = cache();
        let policy = policy();

        let first = cache
            .get_or_fetch("k", &policy, |_| async { Ok(Lookup::Found(42u32)) })
            .await;
        let second = cache.get_or_fetch("k", &policy, never_called::<u32>).await;

        assert_eq!(first, Ok(Lookup::Found(42)));
        assert_eq!(second, Ok(Lookup::Found(42)));
    }

    #[tokio::test]
    async fn test_not_found_is_cached_with_negative_ttl() {
        let (_, cache) = cache();
        let policy = policy();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let result = cache
                .get_or_fetch("00000000", &policy, move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Lookup::<String>::NotFound)
                })
                .await;
            assert_eq!(result, Ok(Lookup::NotFound));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let entry = cache.get::<String>("00000000", &policy).await.unwrap();
        assert!(entry.is_negative());
        assert_eq!((entry.expires_at - entry.stored_at).num_seconds(), 60);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (_, cache) = cache();
        let policy = policy();

        let failed = cache
            .get_or_fetch::<String, _, _>("k", &policy, |_| async {
                Err(LookupError::AllProvidersFailed {
                    stage: "address".to_string(),
                })
            })
            .await;
        assert!(matches!(failed, Err(LookupError::AllProvidersFailed { .. })));

        let retried = cache
            .get_or_fetch("k", &policy, |_| async { Ok(Lookup::Found("ok".to_string())) })
            .await;
        assert_eq!(retried, Ok(Lookup::Found("ok".to_string())));
    }

    #[tokio::test]
    async fn test_timeout_clears_pending_and_next_call_fetches_fresh() {
        let (store, cache) = cache();
        let policy = policy().with_fetch_timeout(Duration::from_millis(40));
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_calls = calls.clone();
        let slow = cache
            .get_or_fetch("k", &policy, move |cancel| async move {
                slow_calls.fetch_add(1, Ordering::SeqCst);
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                }
                Ok(Lookup::Found(1u8))
            })
            .await;
        assert_eq!(slow, Err(LookupError::TimeoutExceeded));
        assert_eq!(cache.pending_count(), 0);
        assert!(cache.get::<u8>("k", &policy).await.is_none());
        assert_eq!(store.get(&policy.lock_key("k")).await.unwrap(), None);
        assert_eq!(store.get(&policy.pending_counter_key()).await.unwrap(), None);

        let fast_calls = calls.clone();
        let fast = cache
            .get_or_fetch("k", &policy, move |_| async move {
                fast_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Lookup::Found(2u8))
            })
            .await;
        assert_eq!(fast, Ok(Lookup::Found(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pending_ceiling_fails_fast() {
        let (_, cache) = cache();
        let policy = policy()
            .with_max_pending_fetches(2)
            .with_fetch_timeout(Duration::from_secs(5));
        let gate = Arc::new(Semaphore::new(0));

        let blocked: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|key| {
                let cache = cache.clone();
                let policy = policy.clone();
                let gate = gate.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_fetch(key, &policy, move |_| async move {
                            let _permit = gate.acquire().await;
                            Ok(Lookup::Found(key.to_string()))
                        })
                        .await
                })
            })
            .collect();

        while cache.pending_count() < 2 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let started = Instant::now();
        let overloaded = cache
            .get_or_fetch("c", &policy, never_called::<String>)
            .await;
        assert_eq!(overloaded, Err(LookupError::ServiceOverload));
        assert!(started.elapsed() < Duration::from_millis(100));

        gate.add_permits(2);
        for handle in blocked {
            assert!(handle.await.unwrap().is_ok());
        }

        let admitted = cache
            .get_or_fetch("c", &policy, |_| async { Ok(Lookup::Found("c".to_string())) })
            .await;
        assert_eq!(admitted, Ok(Lookup::Found("c".to_string())));
    }

    #[tokio::test]
    async fn test_panicking_fetch_releases_bookkeeping() {
        let (store, cache) = cache();
        let policy = policy();

        let result = cache.get_or_fetch("k", &policy, panicking).await;

        assert!(matches!(result, Err(LookupError::Internal(_))));
        assert_eq!(cache.pending_count(), 0);
        assert_eq!(store.get(&policy.pending_counter_key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_follows_fetch_owned_by_another_instance() {
        let (store, cache) = cache();
        let policy = policy();

        store
            .set_if_absent(&policy.lock_key("k"), "other-instance", Duration::from_secs(5))
            .await
            .unwrap();

        let peer_store = store.clone();
        let peer_policy = policy.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let entry = CacheEntry::new(Lookup::Found("from-peer".to_string()), &peer_policy);
            peer_store
                .set_with_ttl(
                    &peer_policy.entry_key("k"),
                    &serde_json::to_string(&entry).unwrap(),
                    Duration::from_secs(60),
                )
                .await
                .unwrap();
        });

        let result = cache
            .get_or_fetch("k", &policy, never_called::<String>)
            .await;

        assert_eq!(result, Ok(Lookup::Found("from-peer".to_string())));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (_, cache) = cache();
        let policy = policy();

        cache
            .get_or_fetch("k", &policy, |_| async { Ok(Lookup::Found(1u8)) })
            .await
            .unwrap();
        cache.invalidate("k", &policy).await.unwrap();

        let refreshed = cache
            .get_or_fetch("k", &policy, |_| async { Ok(Lookup::Found(2u8)) })
            .await;
        assert_eq!(refreshed, Ok(Lookup::Found(2)));
    }

    #[tokio::test]
    async fn test_entry_filled_before_lock_is_taken_is_not_fetched_again() {
        let shared = Arc::new(MemoryStore::new());
        let fast = Arc::new(CacheStore::new(shared.clone()));
        let stalled = Arc::new(CacheStore::new(Arc::new(StalledFirstRead {
            inner: shared.clone(),
            reads: AtomicUsize::new(0),
            stall: Duration::from_millis(100),
        })));
        let policy = policy();
        let calls = Arc::new(AtomicUsize::new(0));

        let lookups = [fast, stalled].map(|cache| {
            let policy = policy.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("01310100", &policy, move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(Lookup::Found("paulista".to_string()))
                    })
                    .await
            })
        });

        for lookup in lookups {
            assert_eq!(lookup.await.unwrap(), Ok(Lookup::Found("paulista".to_string())));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_caller_cancels_unshared_fetch() {
        let (store, cache) = cache();
        let policy = policy().with_fetch_timeout(Duration::from_secs(5));
        let parent = CancellationToken::new();
        let saw_cancel = Arc::new(AtomicUsize::new(0));

        let lookup = tokio::spawn({
            let cache = cache.clone();
            let policy = policy.clone();
            let parent = parent.clone();
            let saw_cancel = saw_cancel.clone();
            async move {
                cache
                    .get_or_fetch_with("k", &policy, &parent, move |cancel| async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                saw_cancel.fetch_add(1, Ordering::SeqCst);
                            }
                            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                        }
                        Ok(Lookup::Found(1u8))
                    })
                    .await
            }
        });

        while cache.pending_count() == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        parent.cancel();

        assert_eq!(lookup.await.unwrap(), Err(LookupError::TimeoutExceeded));
        tokio::time::timeout(Duration::from_secs(1), async {
            while saw_cancel.load(Ordering::SeqCst) == 0
                || store.get(&policy.lock_key("k")).await.unwrap().is_some()
            {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(cache.pending_count(), 0);
        assert!(cache.get::<u8>("k", &policy).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_survives_while_another_caller_waits() {
        let (_, cache) = cache();
        let policy = policy().with_fetch_timeout(Duration::from_secs(5));
        let impatient = CancellationToken::new();
        let gate = Arc::new(Semaphore::new(0));

        let first = tokio::spawn({
            let cache = cache.clone();
            let policy = policy.clone();
            let impatient = impatient.clone();
            let gate = gate.clone();
            async move {
                cache
                    .get_or_fetch_with("k", &policy, &impatient, move |cancel| async move {
                        tokio::select! {
                            _ = cancel.cancelled() => Err(LookupError::TimeoutExceeded),
                            _ = gate.acquire() => Ok(Lookup::Found(7u8)),
                        }
                    })
                    .await
            }
        });
        while cache.pending_count() == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let second = tokio::spawn({
            let cache = cache.clone();
            let policy = policy.clone();
            async move { cache.get_or_fetch("k", &policy, never_called::<u8>).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        impatient.cancel();
        assert_eq!(first.await.unwrap(), Err(LookupError::TimeoutExceeded));
        assert_eq!(cache.pending_count(), 1);

        gate.add_permits(1);
        assert_eq!(second.await.unwrap(), Ok(Lookup::Found(7)));
        assert_eq!(cache.get::<u8>("k", &policy).await.unwrap().value, Lookup::Found(7));
    }
}
