//! Service wiring and HTTP server lifecycle.
//!
//! Connects the store, builds the provider chains and the lookup service, and
//! runs the Axum server until a shutdown signal arrives.

use crate::application::services::{CepLookupService, ResilientProvider};
use crate::config::Config;
use crate::domain::entities::{Address, GeocodedPlace};
use crate::domain::provider::Provider;
use crate::infrastructure::cache::{CachePolicy, CacheStore};
use crate::infrastructure::providers::{
    AwesomeApiSource, BrasilApiSource, HttpProvider, HttpTransport, NominatimSource,
    PhotonSource, ProviderSource, ReqwestTransport, RetryPolicy, ViaCepSource,
};
use crate::infrastructure::rate_limiter::{RateLimitBucket, RateLimiter};
use crate::infrastructure::store::{KeyValueStore, MemoryStore, RedisStore};
use crate::routes::app_router;
use crate::state::{AppState, StoreBackend};
use crate::utils::address_key::address_cache_key;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Cache namespace of the address stage.
pub const ADDRESS_STAGE: &str = "address";
/// Cache namespace of the geocoding stage.
pub const GEOCODE_STAGE: &str = "geocode";
/// Cache namespace of final coordinates.
pub const COORDINATES_STAGE: &str = "coordinates";

/// Built-in outbound budgets as `(provider, max requests, window)`.
///
/// Nominatim's public usage policy allows one request per second.
const PROVIDER_LIMITS: &[(&str, u64, Duration)] = &[
    ("viacep", 300, Duration::from_secs(60)),
    ("brasilapi", 300, Duration::from_secs(60)),
    ("awesomeapi", 100, Duration::from_secs(60)),
    ("nominatim", 1, Duration::from_secs(1)),
    ("photon", 60, Duration::from_secs(60)),
];

fn bucket_for(provider: &str) -> RateLimitBucket {
    let (max, window) = PROVIDER_LIMITS
        .iter()
        .find(|(name, _, _)| *name == provider)
        .map(|(_, max, window)| (*max, *window))
        .unwrap_or((60, Duration::from_secs(60)));
    RateLimitBucket::new(provider, max, window)
}

/// Connects to Redis when configured, otherwise (or on failure) falls back to
/// a process-local store.
pub async fn connect_store(config: &Config) -> (Arc<dyn KeyValueStore>, StoreBackend) {
    if let Some(redis_url) = &config.redis_url {
        match RedisStore::connect(redis_url, config.redis_key_prefix.clone()).await {
            Ok(redis) => {
                tracing::info!("Store enabled (Redis)");
                return (Arc::new(redis), StoreBackend::Redis);
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using MemoryStore.", e);
            }
        }
    } else {
        tracing::info!("Redis not configured, using MemoryStore");
    }

    (Arc::new(MemoryStore::new()), StoreBackend::Memory)
}

/// Context shared by every provider built for one service instance.
struct ProviderFactory {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl ProviderFactory {
    fn build<T, S>(&self, source: S) -> Arc<dyn Provider<T>>
    where
        T: Send + 'static,
        S: ProviderSource<T> + 'static,
    {
        let bucket = bucket_for(source.name());
        Arc::new(
            HttpProvider::new(source, Arc::clone(&self.transport), Arc::clone(&self.limiter), bucket)
                .with_retry(self.retry.clone())
                .with_request_timeout(self.request_timeout),
        )
    }
}

/// Builds the lookup service on top of `store`.
///
/// Address chain: ViaCEP, BrasilAPI, AwesomeAPI. Geocoding chain: Nominatim,
/// Photon. The order is fixed here and never changes at runtime.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_lookup_service(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
) -> Result<CepLookupService> {
    let transport = ReqwestTransport::new(&config.geocoder_user_agent)
        .context("Failed to build HTTP client")?;

    let providers = ProviderFactory {
        transport: Arc::new(transport),
        limiter: Arc::new(RateLimiter::new(Arc::clone(&store))),
        retry: RetryPolicy::new(config.provider_max_attempts, config.provider_backoff()),
        request_timeout: config.provider_timeout(),
    };

    let cache = Arc::new(CacheStore::new(store));
    let stage_policy = |prefix: &str, positive_ttl_seconds: u64| {
        CachePolicy::new(prefix)
            .with_ttls(
                Duration::from_secs(positive_ttl_seconds),
                config.negative_cache_ttl(),
            )
            .with_max_pending_fetches(config.max_pending_fetches)
            .with_fetch_timeout(config.stage_fetch_timeout())
    };

    let addresses = ResilientProvider::<Address>::new(
        ADDRESS_STAGE,
        vec![
            providers.build(ViaCepSource::new()),
            providers.build(BrasilApiSource::new()),
            providers.build(AwesomeApiSource::new()),
        ],
        Arc::clone(&cache),
        stage_policy(ADDRESS_STAGE, config.address_cache_ttl_seconds),
    );

    let geocoder = ResilientProvider::<GeocodedPlace>::new(
        GEOCODE_STAGE,
        vec![
            providers.build(NominatimSource::new()),
            providers.build(PhotonSource::new()),
        ],
        Arc::clone(&cache),
        stage_policy(GEOCODE_STAGE, config.geocode_cache_ttl_seconds),
    )
    .with_key_fn(address_cache_key);

    let coordinates_policy =
        stage_policy(COORDINATES_STAGE, config.coordinates_cache_ttl_seconds)
            .with_fetch_timeout(config.lookup_timeout());

    tracing::info!(
        address_chain = ?addresses.provider_names(),
        geocode_chain = ?geocoder.provider_names(),
        "Provider chains ready"
    );

    Ok(CepLookupService::new(
        Arc::new(addresses),
        Arc::new(geocoder),
        cache,
        coordinates_policy,
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Redis store (or MemoryStore fallback)
/// - Provider chains and the lookup service
/// - Axum HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - The HTTP client cannot be built
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let (store, backend) = connect_store(&config).await;

    let lookup_service = build_lookup_service(&config, Arc::clone(&store))?;
    let state = AppState::new(Arc::new(lookup_service), store, backend);

    let app = app_router(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
