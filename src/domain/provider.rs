//! Adapter contract for external address and geocoding APIs.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::ProviderError;
use crate::domain::lookup::Lookup;

/// One external API that can answer a query with a `T`.
///
/// Any concrete provider plugs into a fallback chain by implementing this
/// trait only. The query is already normalized by the caller: a digits-only
/// CEP for address providers, a free-form address for geocoders.
///
/// # Contract
///
/// - `Ok(Lookup::Found(_))` - the provider answered
/// - `Ok(Lookup::NotFound)` - the provider definitively has no match
/// - `Err(ProviderError::Busy)` - the local rate limit denied the call
/// - `Err(ProviderError::Failure)` - the provider malfunctioned, retries included
///
/// Implementations must stop outbound work once `cancel` fires.
///
/// # Implementations
///
/// - [`crate::infrastructure::providers::HttpProvider`] - HTTP adapter template
#[async_trait]
pub trait Provider<T>: Send + Sync {
    /// Stable identifier used for logs, metrics and rate-limit buckets.
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Lookup<T>, ProviderError>;
}
