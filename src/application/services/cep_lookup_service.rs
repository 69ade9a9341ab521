//! CEP to coordinate lookup.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::resilient_provider::ResilientProvider;
use crate::domain::entities::{Address, Coordinate, GeocodedPlace};
use crate::domain::errors::LookupError;
use crate::domain::lookup::Lookup;
use crate::domain::precision::classify_address;
use crate::infrastructure::cache::{CachePolicy, CacheStore};
use crate::utils::cep::normalize_cep;

/// Resolves a CEP to `{latitude, longitude, precision}`.
///
/// The address chain runs first. When the address provider already returned
/// coordinates, geocoding is skipped; otherwise the geocoding chain resolves
/// the address text. The final coordinate is cached again under the CEP, so a
/// warm lookup touches neither inner stage.
pub struct CepLookupService {
    addresses: Arc<ResilientProvider<Address>>,
    geocoder: Arc<ResilientProvider<GeocodedPlace>>,
    cache: Arc<CacheStore>,
    policy: CachePolicy,
}

impl CepLookupService {
    pub fn new(
        addresses: Arc<ResilientProvider<Address>>,
        geocoder: Arc<ResilientProvider<GeocodedPlace>>,
        cache: Arc<CacheStore>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            addresses,
            geocoder,
            cache,
            policy,
        }
    }

    /// Looks up a CEP in any accepted spelling (`01310100`, `01310-100`).
    ///
    /// # Errors
    ///
    /// - [`LookupError::InvalidInput`] if the input is not a CEP
    /// - [`LookupError::InvalidCep`] if no provider knows the CEP
    /// - [`LookupError::CoordinatesNotFound`] if the address cannot be geocoded
    /// - [`LookupError::ServiceBusy`], [`LookupError::ServiceOverload`],
    ///   [`LookupError::TimeoutExceeded`], [`LookupError::AllProvidersFailed`]
    ///   from the resolution stages
    pub async fn execute(&self, raw_cep: &str) -> Result<Coordinate, LookupError> {
        let cep = normalize_cep(raw_cep).map_err(|e| LookupError::InvalidInput(e.to_string()))?;

        let addresses = Arc::clone(&self.addresses);
        let geocoder = Arc::clone(&self.geocoder);
        let key = cep.clone();

        let lookup = self
            .cache
            .get_or_fetch(&cep, &self.policy, move |cancel| async move {
                resolve(&addresses, &geocoder, &key, &cancel)
                    .await
                    .map(Lookup::Found)
            })
            .await?;

        match lookup {
            Lookup::Found(coordinate) => Ok(coordinate),
            Lookup::NotFound => Err(LookupError::InvalidCep),
        }
    }

    /// Drops the cached coordinate for a CEP so the next lookup resolves it
    /// again. Inner stage caches are left alone.
    ///
    /// # Errors
    ///
    /// [`LookupError::InvalidInput`] for a malformed CEP, [`LookupError::Internal`]
    /// if the store rejects the delete.
    pub async fn invalidate(&self, raw_cep: &str) -> Result<(), LookupError> {
        let cep = normalize_cep(raw_cep).map_err(|e| LookupError::InvalidInput(e.to_string()))?;

        self.cache
            .invalidate(&cep, &self.policy)
            .await
            .map_err(|e| LookupError::Internal(e.to_string()))?;

        debug!(cep = %cep, "Coordinate cache entry invalidated");
        Ok(())
    }
}

async fn resolve(
    addresses: &ResilientProvider<Address>,
    geocoder: &ResilientProvider<GeocodedPlace>,
    cep: &str,
    cancel: &CancellationToken,
) -> Result<Coordinate, LookupError> {
    let address = addresses
        .resolve_with(cep, cancel)
        .await?
        .found()
        .ok_or(LookupError::InvalidCep)?;

    let coordinate = match address.location {
        Some(point) => {
            debug!(cep, "Address carries coordinates, skipping geocoding");
            Coordinate::new(point, classify_address(&address))
        }
        None => {
            let query = address.geocoding_query();
            let place = geocoder
                .resolve_with(&query, cancel)
                .await?
                .found()
                .ok_or(LookupError::CoordinatesNotFound)?;
            Coordinate::new(place.point, place.precision())
        }
    };

    info!(
        cep,
        latitude = coordinate.latitude,
        longitude = coordinate.longitude,
        precision = %coordinate.precision,
        "CEP resolved"
    );
    Ok(coordinate)
}
