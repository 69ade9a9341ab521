#![allow(dead_code)]

use async_trait::async_trait;
use cep_locator::application::services::{CepLookupService, ResilientProvider};
use cep_locator::domain::entities::{Address, GeoPoint, GeocodedPlace, OsmPlace};
use cep_locator::domain::errors::ProviderError;
use cep_locator::domain::lookup::Lookup;
use cep_locator::domain::provider::Provider;
use cep_locator::infrastructure::cache::{CachePolicy, CacheStore};
use cep_locator::infrastructure::providers::{HttpResponse, HttpTransport, TransportError};
use cep_locator::infrastructure::store::{KeyValueStore, MemoryStore};
use cep_locator::state::{AppState, StoreBackend};
use cep_locator::utils::address_key::address_cache_key;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Provider returning the same scripted result on every call.
pub struct ScriptedProvider<T> {
    name: &'static str,
    result: Result<Lookup<T>, ProviderError>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    cancellations: AtomicUsize,
}

impl<T> ScriptedProvider<T> {
    fn new(name: &'static str, result: Result<Lookup<T>, ProviderError>) -> Self {
        Self {
            name,
            result,
            delay: None,
            gate: None,
            calls: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
        }
    }

    pub fn found(name: &'static str, value: T) -> Self {
        Self::new(name, Ok(Lookup::Found(value)))
    }

    pub fn not_found(name: &'static str) -> Self {
        Self::new(name, Ok(Lookup::NotFound))
    }

    pub fn failing(name: &'static str) -> Self {
        Self::new(
            name,
            Err(ProviderError::Failure {
                provider: name.to_string(),
                reason: "HTTP 503".to_string(),
            }),
        )
    }

    pub fn busy(name: &'static str) -> Self {
        Self::new(
            name,
            Err(ProviderError::Busy {
                provider: name.to_string(),
            }),
        )
    }

    /// Sleeps before answering, or fails early when cancelled.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Waits for a permit before answering. Permits are never returned.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that were cancelled before answering.
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Provider<T> for ScriptedProvider<T> {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(
        &self,
        _query: &str,
        cancel: &CancellationToken,
    ) -> Result<Lookup<T>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancellations.fetch_add(1, Ordering::SeqCst);
                    return Err(ProviderError::Failure {
                        provider: self.name.to_string(),
                        reason: "cancelled".to_string(),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.result.clone()
    }
}

/// HTTP transport answering from a URL-prefix table.
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, HttpResponse)>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, url_prefix: &str, status: u16, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((url_prefix.to_string(), HttpResponse::new(status, body)));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &Url, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());

        self.routes
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| url.as_str().starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| TransportError::Connect(format!("no route for {}", url)))
    }
}

/// A lookup service and the store and cache behind it.
pub struct TestStack {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<CacheStore>,
    pub service: Arc<CepLookupService>,
}

pub struct StackBuilder {
    addresses: Vec<Arc<dyn Provider<Address>>>,
    geocoders: Vec<Arc<dyn Provider<GeocodedPlace>>>,
    policies: HashMap<&'static str, CachePolicy>,
    store: Arc<MemoryStore>,
}

impl StackBuilder {
    pub fn new() -> Self {
        let policies = ["address", "geocode", "coordinates"]
            .into_iter()
            .map(|prefix| (prefix, CachePolicy::new(prefix)))
            .collect();

        Self {
            addresses: Vec::new(),
            geocoders: Vec::new(),
            policies,
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn address(mut self, provider: Arc<dyn Provider<Address>>) -> Self {
        self.addresses.push(provider);
        self
    }

    pub fn geocoder(mut self, provider: Arc<dyn Provider<GeocodedPlace>>) -> Self {
        self.geocoders.push(provider);
        self
    }

    /// Adjusts the policy of one stage: `address`, `geocode` or `coordinates`.
    pub fn policy(mut self, stage: &'static str, f: impl FnOnce(CachePolicy) -> CachePolicy) -> Self {
        let policy = self.policies.remove(stage).unwrap();
        self.policies.insert(stage, f(policy));
        self
    }

    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn build(mut self) -> TestStack {
        let store_dyn: Arc<dyn KeyValueStore> = self.store.clone();
        let cache = Arc::new(CacheStore::new(store_dyn));

        let addresses = ResilientProvider::new(
            "address",
            self.addresses,
            Arc::clone(&cache),
            self.policies.remove("address").unwrap(),
        );
        let geocoder = ResilientProvider::new(
            "geocode",
            self.geocoders,
            Arc::clone(&cache),
            self.policies.remove("geocode").unwrap(),
        )
        .with_key_fn(address_cache_key);

        let service = CepLookupService::new(
            Arc::new(addresses),
            Arc::new(geocoder),
            Arc::clone(&cache),
            self.policies.remove("coordinates").unwrap(),
        );

        TestStack {
            store: self.store,
            cache,
            service: Arc::new(service),
        }
    }
}

pub fn create_test_state(stack: &TestStack) -> AppState {
    AppState::new(
        Arc::clone(&stack.service),
        stack.store.clone(),
        StoreBackend::Memory,
    )
}

pub fn paulista() -> Address {
    Address::new("01310100", "Avenida Paulista", "Bela Vista", "São Paulo", "SP")
}

pub fn paulista_with_location() -> Address {
    paulista().with_location(Some(GeoPoint::new(-23.5613991, -46.6558819)))
}

pub fn paulista_place() -> GeocodedPlace {
    GeocodedPlace::new(
        GeoPoint::new(-23.5614, -46.6559),
        OsmPlace {
            rank: Some(26),
            kind: Some("primary".to_string()),
            category: Some("highway".to_string()),
        },
        "Avenida Paulista, Bela Vista, São Paulo",
    )
}

pub const VIACEP_PAULISTA: &str = r#"{
    "cep": "01310-100",
    "logradouro": "Avenida Paulista",
    "bairro": "Bela Vista",
    "localidade": "São Paulo",
    "uf": "SP"
}"#;

pub const NOMINATIM_PAULISTA: &str = r#"[{
    "lat": "-23.5613991",
    "lon": "-46.6558819",
    "place_rank": 26,
    "category": "highway",
    "type": "primary",
    "display_name": "Avenida Paulista, Bela Vista, São Paulo"
}]"#;
