//! Adapters for the external address and geocoding APIs.
//!
//! Every adapter is an [`HttpProvider`] around a [`ProviderSource`], so the
//! rate-limit pre-check, retry schedule and response classification are the
//! same for all of them.
//!
//! # Address sources
//!
//! - [`ViaCepSource`] - address only
//! - [`BrasilApiSource`] - address, coordinates when known
//! - [`AwesomeApiSource`] - address and coordinates
//!
//! # Geocoding sources
//!
//! - [`NominatimSource`] - OSM search with rank metadata
//! - [`PhotonSource`] - OSM search without rank

mod adapter;
mod awesomeapi;
mod brasilapi;
mod http;
mod nominatim;
mod photon;
mod retry;
mod viacep;

pub use adapter::{DEFAULT_REQUEST_TIMEOUT, HttpProvider, ProviderSource};
pub use awesomeapi::{AWESOMEAPI_BASE_URL, AwesomeApiSource};
pub use brasilapi::{BRASILAPI_BASE_URL, BrasilApiSource};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use nominatim::{NOMINATIM_BASE_URL, NominatimSource};
pub use photon::{PHOTON_BASE_URL, PhotonSource};
pub use retry::RetryPolicy;
pub use viacep::{VIACEP_BASE_URL, ViaCepSource};

#[cfg(test)]
pub use http::MockHttpTransport;
