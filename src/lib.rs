//! # CEP Locator
//!
//! Resolves Brazilian postal codes (CEP) to latitude/longitude by querying
//! several unreliable third-party APIs with automatic failover.
//!
//! ## Architecture
//!
//! This crate follows Clean Architecture principles with clear layer separation:
//!
//! - **Domain Layer** ([`domain`]) - Entities, result variants, error taxonomy, provider contract
//! - **Application Layer** ([`application`]) - Fallback chains and the lookup use case
//! - **Infrastructure Layer** ([`infrastructure`]) - Store, cache, rate limiter, HTTP providers
//! - **API Layer** ([`api`]) - REST handlers, DTOs, and middleware
//!
//! ## Features
//!
//! - Ordered provider fallback (ViaCEP, BrasilAPI, AwesomeAPI, Nominatim, Photon)
//! - Single-flight cache with negative caching, shared across instances via Redis
//! - Per-provider fixed-window rate limiting
//! - Global ceiling on concurrent cache misses, with per-stage deadlines
//! - Precision tier (rooftop, neighborhood, city) for every coordinate
//!
//! ## Quick Start
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379"  # Optional
//!
//! # Start the service
//! cargo run
//!
//! # One-off lookup
//! cargo run --bin lookup -- 01310-100
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::services::{CepLookupService, ResilientProvider};
    pub use crate::domain::entities::{Address, Coordinate, GeoPoint, GeocodedPlace, Precision};
    pub use crate::domain::errors::{LookupError, ProviderError};
    pub use crate::domain::lookup::Lookup;
    pub use crate::domain::provider::Provider;
    pub use crate::error::AppError;
    pub use crate::infrastructure::cache::{CachePolicy, CacheStore};
    pub use crate::infrastructure::store::{KeyValueStore, MemoryStore};
    pub use crate::state::{AppState, StoreBackend};
}
