use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::errors::LookupError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
    details: Value,
}

#[derive(Debug)]
pub enum AppError {
    Validation { message: String, details: Value },
    TooManyRequests { message: String, details: Value },
    Unavailable { message: String, details: Value },
    Timeout { message: String, details: Value },
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn too_many_requests(message: impl Into<String>, details: Value) -> Self {
        Self::TooManyRequests {
            message: message.into(),
            details,
        }
    }
    pub fn unavailable(message: impl Into<String>, details: Value) -> Self {
        Self::Unavailable {
            message: message.into(),
            details,
        }
    }
    pub fn timeout(message: impl Into<String>, details: Value) -> Self {
        Self::Timeout {
            message: message.into(),
            details,
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, details) = match self {
            AppError::Validation { message, details } => ("validation_error", message, details),
            AppError::TooManyRequests { message, details } => {
                ("too_many_requests", message, details)
            }
            AppError::Unavailable { message, details } => {
                ("service_unavailable", message, details)
            }
            AppError::Timeout { message, details } => ("timeout", message, details),
            AppError::Internal { message, details } => ("internal_error", message, details),
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Maps the lookup taxonomy to HTTP statuses.
///
/// An unknown CEP and an ungeocodable address are client-facing 400s, not 404s.
impl From<LookupError> for AppError {
    fn from(e: LookupError) -> Self {
        let message = e.to_string();
        match e {
            LookupError::InvalidInput(reason) => {
                AppError::bad_request("Invalid CEP format", json!({ "reason": reason }))
            }
            LookupError::InvalidCep => AppError::bad_request(message, json!({ "reason": "cep_not_found" })),
            LookupError::CoordinatesNotFound => {
                AppError::bad_request(message, json!({ "reason": "coordinates_not_found" }))
            }
            LookupError::ServiceBusy { provider } => AppError::too_many_requests(
                "Upstream provider is rate limited, retry later",
                json!({ "provider": provider }),
            ),
            LookupError::ServiceOverload => AppError::unavailable(message, json!({})),
            LookupError::AllProvidersFailed { stage } => {
                AppError::unavailable(message, json!({ "stage": stage }))
            }
            LookupError::TimeoutExceeded => AppError::timeout(message, json!({})),
            LookupError::Internal(reason) => {
                tracing::error!("Lookup failed: {}", reason);
                AppError::internal("Internal error", json!({}))
            }
        }
    }
}
