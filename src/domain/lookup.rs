//! Tagged result variants exchanged between adapters, chains and the cache.

use serde::{Deserialize, Serialize};

use crate::domain::errors::ProviderError;

/// Result of a lookup that completed without failing.
///
/// `NotFound` is a definitive answer ("this input does not exist"), not an
/// error. It is what the cache stores as a negative entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

/// Classification of a single provider interaction.
///
/// Produced at the adapter boundary from the raw transport result and
/// consumed exhaustively by the retry wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome<T> {
    Success(T),
    NotFound,
    /// Network failure, 5xx, or a remote rate-limit status. Worth retrying.
    TransientFailure(String),
    /// The local rate limiter denied the call.
    ServiceBusy,
    /// Any other persistent condition (bad payload, unexpected 4xx).
    FatalFailure(String),
}

impl<T> ProviderOutcome<T> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::NotFound => "not_found",
            Self::TransientFailure(_) => "transient_failure",
            Self::ServiceBusy => "service_busy",
            Self::FatalFailure(_) => "fatal_failure",
        }
    }

    /// Converts the final outcome into the adapter contract.
    pub fn into_result(self, provider: &str) -> Result<Lookup<T>, ProviderError> {
        match self {
            Self::Success(value) => Ok(Lookup::Found(value)),
            Self::NotFound => Ok(Lookup::NotFound),
            Self::ServiceBusy => Err(ProviderError::Busy {
                provider: provider.to_string(),
            }),
            Self::TransientFailure(reason) | Self::FatalFailure(reason) => {
                Err(ProviderError::Failure {
                    provider: provider.to_string(),
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_json_shape() {
        let found = serde_json::to_value(Lookup::Found(7)).unwrap();
        assert_eq!(found, serde_json::json!({ "status": "found", "value": 7 }));

        let missing = serde_json::to_value(Lookup::<i32>::NotFound).unwrap();
        assert_eq!(missing, serde_json::json!({ "status": "not_found" }));
    }

    #[test]
    fn test_outcome_into_result() {
        assert_eq!(
            ProviderOutcome::Success(1).into_result("viacep"),
            Ok(Lookup::Found(1))
        );
        assert_eq!(
            ProviderOutcome::<i32>::NotFound.into_result("viacep"),
            Ok(Lookup::NotFound)
        );
        assert!(matches!(
            ProviderOutcome::<i32>::ServiceBusy.into_result("viacep"),
            Err(ProviderError::Busy { provider }) if provider == "viacep"
        ));
        assert!(matches!(
            ProviderOutcome::<i32>::TransientFailure("503".into()).into_result("viacep"),
            Err(ProviderError::Failure { .. })
        ));
    }
}
