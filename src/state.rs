use std::sync::Arc;

use crate::application::services::CepLookupService;
use crate::infrastructure::store::KeyValueStore;

/// Which store backs caching, rate limiting and single-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub lookup_service: Arc<CepLookupService>,
    pub store: Arc<dyn KeyValueStore>,
    pub store_backend: StoreBackend,
}

impl AppState {
    pub fn new(
        lookup_service: Arc<CepLookupService>,
        store: Arc<dyn KeyValueStore>,
        store_backend: StoreBackend,
    ) -> Self {
        Self {
            lookup_service,
            store,
            store_backend,
        }
    }
}
