//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::{AppState, StoreBackend};

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: Store reachable
/// - **503 Service Unavailable**: Store unreachable
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "store": {
///       "status": "ok",
///       "message": "Redis connected"
///     }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let store_check = check_store(&state).await;
    let healthy = store_check.status == "ok";

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks { store: store_check },
    };

    if healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Checks store connectivity (Redis PING, always ok for the in-memory store).
async fn check_store(state: &AppState) -> CheckStatus {
    let reachable = state.store.health_check().await;

    let message = match (state.store_backend, reachable) {
        (StoreBackend::Redis, true) => "Redis connected",
        (StoreBackend::Redis, false) => "Redis connection failed",
        (StoreBackend::Memory, _) => "In-memory store (single instance)",
    };

    CheckStatus {
        status: if reachable { "ok" } else { "error" }.to_string(),
        message: Some(message.to_string()),
    }
}
