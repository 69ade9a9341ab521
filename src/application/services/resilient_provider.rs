//! Ordered fallback chain over several providers, cached per query.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::{LookupError, ProviderError};
use crate::domain::lookup::Lookup;
use crate::domain::provider::Provider;
use crate::infrastructure::cache::{CachePolicy, CacheStore};

/// Derives the cache key from an already-normalized query.
pub type KeyFn = fn(&str) -> String;

/// Resolves a query through a fixed, ordered list of providers.
///
/// The provider order is set at construction and never changes. Results,
/// including a definitive `NotFound`, go through the [`CacheStore`] under this
/// stage's [`CachePolicy`].
pub struct ResilientProvider<T> {
    stage: String,
    chain: Arc<[Arc<dyn Provider<T>>]>,
    cache: Arc<CacheStore>,
    policy: CachePolicy,
    key_fn: KeyFn,
}

impl<T> ResilientProvider<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Creates a chain that uses the query itself as cache key.
    pub fn new(
        stage: impl Into<String>,
        providers: Vec<Arc<dyn Provider<T>>>,
        cache: Arc<CacheStore>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            stage: stage.into(),
            chain: providers.into(),
            cache,
            policy,
            key_fn: str::to_string,
        }
    }

    pub fn with_key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = key_fn;
        self
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Provider names in the order they are tried.
    pub fn provider_names(&self) -> Vec<String> {
        self.chain.iter().map(|p| p.name().to_string()).collect()
    }

    /// Returns the cached answer for `query`, walking the chain on a miss.
    ///
    /// # Errors
    ///
    /// - [`LookupError::ServiceBusy`] if a provider was rate limited
    /// - [`LookupError::AllProvidersFailed`] if every provider failed
    /// - [`LookupError::ServiceOverload`] / [`LookupError::TimeoutExceeded`] from the cache
    pub async fn resolve(&self, query: &str) -> Result<Lookup<T>, LookupError> {
        self.resolve_with(query, &CancellationToken::new()).await
    }

    /// Like [`ResilientProvider::resolve`], giving up once `cancel` fires.
    /// The chain walk is cancelled when no other caller is waiting on it.
    pub async fn resolve_with(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Lookup<T>, LookupError> {
        let key = (self.key_fn)(query);
        let stage = self.stage.clone();
        let chain = Arc::clone(&self.chain);
        let query = query.to_string();

        self.cache
            .get_or_fetch_with(&key, &self.policy, cancel, move |cancel| async move {
                attempt_chain(&stage, &chain, &query, &cancel).await
            })
            .await
    }

    /// Walks the chain once, bypassing the cache.
    pub async fn attempt_chain(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Lookup<T>, LookupError> {
        attempt_chain(&self.stage, &self.chain, query, cancel).await
    }
}

/// Tries each provider in order.
///
/// - `Found` returns at once; later providers are not called.
/// - `NotFound` and `Failure` move on to the next provider.
/// - `Busy` aborts the whole chain.
///
/// Once the chain is exhausted, a single `NotFound` anywhere makes the
/// result `NotFound`; only all-failures yield `AllProvidersFailed`. A
/// cancelled walk stops before the next provider with `TimeoutExceeded`.
async fn attempt_chain<T>(
    stage: &str,
    chain: &[Arc<dyn Provider<T>>],
    query: &str,
    cancel: &CancellationToken,
) -> Result<Lookup<T>, LookupError> {
    let mut not_found = false;

    for (position, provider) in chain.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(stage, position, "Chain cancelled");
            return Err(LookupError::TimeoutExceeded);
        }

        match provider.fetch(query, cancel).await {
            Ok(Lookup::Found(value)) => {
                info!(stage, provider = provider.name(), position, "Resolved");
                return Ok(Lookup::Found(value));
            }
            Ok(Lookup::NotFound) => {
                debug!(stage, provider = provider.name(), "No match, trying next provider");
                not_found = true;
            }
            Err(ProviderError::Busy { provider }) => {
                warn!(stage, provider, "Provider rate limited, aborting chain");
                return Err(LookupError::ServiceBusy { provider });
            }
            Err(ProviderError::Failure { provider, reason }) => {
                warn!(stage, provider, "Provider failed, trying next: {}", reason);
            }
        }
    }

    if not_found {
        Ok(Lookup::NotFound)
    } else {
        warn!(stage, providers = chain.len(), "All providers failed");
        Err(LookupError::AllProvidersFailed {
            stage: stage.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        result: Result<Lookup<String>, ProviderError>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, result: Result<Lookup<String>, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
            })
        }

        fn found(name: &'static str, value: &str) -> Arc<Self> {
            Self::new(name, Ok(Lookup::Found(value.to_string())))
        }

        fn not_found(name: &'static str) -> Arc<Self> {
            Self::new(name, Ok(Lookup::NotFound))
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Self::new(
                name,
                Err(ProviderError::Failure {
                    provider: name.to_string(),
                    reason: "HTTP 503".to_string(),
                }),
            )
        }

        fn busy(name: &'static str) -> Arc<Self> {
            Self::new(
                name,
                Err(ProviderError::Busy {
                    provider: name.to_string(),
                }),
            )
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider<String> for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(
            &self,
            _query: &str,
            _cancel: &CancellationToken,
        ) -> Result<Lookup<String>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn chain(providers: &[&Arc<Fixed>]) -> ResilientProvider<String> {
        let providers = providers
            .iter()
            .map(|p| Arc::clone(*p) as Arc<dyn Provider<String>>)
            .collect();
        let cache = Arc::new(CacheStore::new(Arc::new(MemoryStore::new())));
        ResilientProvider::new("address", providers, cache, CachePolicy::new("address"))
    }

    #[tokio::test]
    async fn test_first_match_short_circuits() {
        let a = Fixed::failing("a");
        let b = Fixed::found("b", "rua b");
        let c = Fixed::found("c", "rua c");

        let result = chain(&[&a, &b, &c]).resolve("01310100").await;

        assert_eq!(result, Ok(Lookup::Found("rua b".to_string())));
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_not_found_continues_to_next_provider() {
        let a = Fixed::not_found("a");
        let b = Fixed::found("b", "rua b");

        let result = chain(&[&a, &b]).resolve("01310100").await;

        assert_eq!(result, Ok(Lookup::Found("rua b".to_string())));
        assert_eq!((a.calls(), b.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_busy_aborts_chain() {
        let a = Fixed::busy("a");
        let b = Fixed::found("b", "rua b");

        let result = chain(&[&a, &b]).resolve("01310100").await;

        assert_eq!(
            result,
            Err(LookupError::ServiceBusy {
                provider: "a".to_string()
            })
        );
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_failures_raise_all_providers_failed() {
        let a = Fixed::failing("a");
        let b = Fixed::failing("b");
        let c = Fixed::failing("c");

        let result = chain(&[&a, &b, &c]).resolve("01310100").await;

        assert_eq!(
            result,
            Err(LookupError::AllProvidersFailed {
                stage: "address".to_string()
            })
        );
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_any_not_found_among_failures_is_not_found() {
        let a = Fixed::failing("a");
        let b = Fixed::not_found("b");
        let c = Fixed::failing("c");

        let result = chain(&[&a, &b, &c]).resolve("99999999").await;

        assert_eq!(result, Ok(Lookup::NotFound));
    }

    #[tokio::test]
    async fn test_negative_result_is_cached() {
        let a = Fixed::not_found("a");
        let resilient = chain(&[&a]);

        assert_eq!(resilient.resolve("99999999").await, Ok(Lookup::NotFound));
        assert_eq!(resilient.resolve("99999999").await, Ok(Lookup::NotFound));
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_key_fn_merges_equivalent_queries() {
        let a = Fixed::found("a", "x");
        let resilient = chain(&[&a]).with_key_fn(|q| q.to_lowercase());

        resilient.resolve("Rua A").await.unwrap();
        resilient.resolve("RUA A").await.unwrap();

        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_attempt_chain_bypasses_cache() {
        let a = Fixed::found("a", "x");
        let resilient = chain(&[&a]);
        let cancel = CancellationToken::new();

        resilient.attempt_chain("q", &cancel).await.unwrap();
        resilient.attempt_chain("q", &cancel).await.unwrap();

        assert_eq!(a.calls(), 2);
        assert_eq!(resilient.provider_names(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_walk_skips_remaining_providers() {
        let a = Fixed::failing("a");
        let resilient = chain(&[&a]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let walked = resilient.attempt_chain("q", &cancel).await;
        let resolved = resilient.resolve_with("q", &cancel).await;

        assert_eq!(walked, Err(LookupError::TimeoutExceeded));
        assert_eq!(resolved, Err(LookupError::TimeoutExceeded));
        assert_eq!(a.calls(), 0);
    }
}
