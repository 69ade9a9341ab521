//! Generic HTTP adapter: rate-limit pre-check, retry, and response
//! classification shared by every concrete provider.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::http::{HttpResponse, HttpTransport, TransportError};
use super::retry::RetryPolicy;
use crate::domain::errors::ProviderError;
use crate::domain::lookup::{Lookup, ProviderOutcome};
use crate::domain::provider::Provider;
use crate::infrastructure::rate_limiter::{RateLimitBucket, RateLimiter};

/// Default per-request timeout for outbound calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// The API-specific half of an adapter: where to send the query and how to
/// read the answer.
pub trait ProviderSource<T>: Send + Sync {
    /// Stable identifier, also the rate-limit bucket name.
    fn name(&self) -> &str;

    /// Request URL for a normalized query.
    fn endpoint(&self, query: &str) -> Result<Url, url::ParseError>;

    /// Decodes a 2xx body. `Ok(Lookup::NotFound)` for an explicit "no match"
    /// payload, `Err` for a payload that cannot be understood.
    fn parse(&self, body: &str) -> Result<Lookup<T>, String>;

    /// Statuses meaning "this resource does not exist".
    fn is_not_found_status(&self, status: u16) -> bool {
        status == 404
    }
}

/// [`Provider`] implementation for any [`ProviderSource`] reachable over HTTP.
pub struct HttpProvider<S> {
    source: S,
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    bucket: RateLimitBucket,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl<S> HttpProvider<S> {
    pub fn new(
        source: S,
        transport: Arc<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        bucket: RateLimitBucket,
    ) -> Self {
        Self {
            source,
            transport,
            limiter,
            bucket,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl<S> HttpProvider<S> {
    /// One outbound call. `Err` carries the reason of a retryable failure.
    async fn attempt<T>(&self, url: &Url, attempt: usize) -> Result<ProviderOutcome<T>, String>
    where
        S: ProviderSource<T>,
    {
        let started = Instant::now();
        let outcome = classify(&self.source, self.transport.get(url, self.request_timeout).await);
        let latency_ms = started.elapsed().as_millis() as u64;
        let provider = self.source.name();

        match &outcome {
            ProviderOutcome::TransientFailure(reason) | ProviderOutcome::FatalFailure(reason) => {
                warn!(
                    provider,
                    attempt,
                    latency_ms,
                    outcome = outcome.label(),
                    "Provider call failed: {}",
                    reason
                );
            }
            _ => debug!(provider, attempt, latency_ms, outcome = outcome.label(), "Provider call"),
        }

        match outcome {
            ProviderOutcome::TransientFailure(reason) => Err(reason),
            other => Ok(other),
        }
    }
}

/// Maps a raw exchange to an outcome.
///
/// Not-found statuses and empty 2xx bodies are `NotFound`. Transport timeouts,
/// refused or dropped connections, 408, 429 and 5xx are transient. Anything else that is
/// not a decodable 2xx is fatal.
fn classify<T, S>(source: &S, result: Result<HttpResponse, TransportError>) -> ProviderOutcome<T>
where
    S: ProviderSource<T> + ?Sized,
{
    let response = match result {
        Ok(response) => response,
        Err(e) if e.is_transient() => return ProviderOutcome::TransientFailure(e.to_string()),
        Err(e) => return ProviderOutcome::FatalFailure(e.to_string()),
    };

    let status = response.status;
    if source.is_not_found_status(status) {
        return ProviderOutcome::NotFound;
    }
    if status == 408 || status == 429 || status >= 500 {
        return ProviderOutcome::TransientFailure(format!("HTTP {}", status));
    }
    if !response.is_success() {
        return ProviderOutcome::FatalFailure(format!("unexpected HTTP {}", status));
    }
    if response.body.trim().is_empty() {
        return ProviderOutcome::NotFound;
    }

    match source.parse(&response.body) {
        Ok(Lookup::Found(value)) => ProviderOutcome::Success(value),
        Ok(Lookup::NotFound) => ProviderOutcome::NotFound,
        Err(e) => ProviderOutcome::FatalFailure(format!("invalid payload: {}", e)),
    }
}

#[async_trait]
impl<T, S> Provider<T> for HttpProvider<S>
where
    T: Send + 'static,
    S: ProviderSource<T>,
{
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn fetch(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Lookup<T>, ProviderError> {
        let provider = self.source.name();

        let outcome = if !self.limiter.try_consume_bucket(&self.bucket).await {
            info!(provider, "Provider rate limit reached");
            ProviderOutcome::ServiceBusy
        } else {
            match self.source.endpoint(query) {
                Err(e) => ProviderOutcome::FatalFailure(format!("cannot build request URL: {}", e)),
                Ok(url) => {
                    let mut attempt = 0;
                    let attempts = self.retry.run(|| {
                        attempt += 1;
                        self.attempt::<T>(&url, attempt)
                    });

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(provider, "Provider call cancelled");
                            ProviderOutcome::TransientFailure("cancelled".to_string())
                        }
                        result = attempts => result.unwrap_or_else(ProviderOutcome::TransientFailure),
                    }
                }
            }
        };

        counter!(
            "provider_requests_total",
            "provider" => provider.to_string(),
            "outcome" => outcome.label()
        )
        .increment(1);

        outcome.into_result(provider)
    }
}
