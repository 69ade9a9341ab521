//! Application layer services implementing the lookup flow.
//!
//! This layer composes domain contracts with infrastructure (cache, providers)
//! and exposes a single entry point for the HTTP handlers and the CLI.
//!
//! # Available Services
//!
//! - [`services::resilient_provider::ResilientProvider`] - Cached, ordered provider fallback chain
//! - [`services::cep_lookup_service::CepLookupService`] - CEP to coordinate resolution

pub mod services;
