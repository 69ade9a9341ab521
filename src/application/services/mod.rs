//! Business logic services for the application layer.

pub mod cep_lookup_service;
pub mod resilient_provider;

pub use cep_lookup_service::CepLookupService;
pub use resilient_provider::{KeyFn, ResilientProvider};
