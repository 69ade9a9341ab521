//! Infrastructure layer for external integrations.
//!
//! This layer implements the interfaces defined by the domain layer, providing
//! concrete implementations for shared state, caching and upstream providers.
//!
//! # Modules
//!
//! - [`store`] - Key-value store abstraction (Redis and in-memory implementations)
//! - [`cache`] - Single-flight cache-aside layer with negative caching
//! - [`rate_limiter`] - Store-backed fixed-window rate limiting
//! - [`providers`] - HTTP adapters for address and geocoding services

pub mod cache;
pub mod providers;
pub mod rate_limiter;
pub mod store;
