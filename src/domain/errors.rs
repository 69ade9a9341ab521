//! Failure taxonomy for CEP resolution.

/// Errors surfaced by the resolution core.
///
/// `Clone` because a single in-flight fetch hands its settled result to
/// every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("CEP does not exist")]
    InvalidCep,

    #[error("no coordinates found for the resolved address")]
    CoordinatesNotFound,

    #[error("provider {provider} is rate limited")]
    ServiceBusy { provider: String },

    #[error("too many lookups in flight")]
    ServiceOverload,

    #[error("lookup deadline exceeded")]
    TimeoutExceeded,

    #[error("all {stage} providers failed")]
    AllProvidersFailed { stage: String },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by a single provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The local rate limit for this provider was exceeded.
    #[error("provider {provider} is rate limited")]
    Busy { provider: String },

    /// The provider malfunctioned after its retries were exhausted.
    #[error("provider {provider} failed: {reason}")]
    Failure { provider: String, reason: String },
}
