//! Handler for CEP to coordinate lookup.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::dto::coordinates::CoordinatesResponse;
use crate::domain::errors::LookupError;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::cep::normalize_cep;

/// Resolves a CEP to coordinates.
///
/// # Endpoint
///
/// `GET /cep/{cep}`
///
/// The CEP may be sent plain (`01310100`) or punctuated (`01310-100`); the
/// response always carries the 8-digit form.
///
/// # Response Codes
///
/// - **200 OK**: Coordinates resolved
/// - **400 Bad Request**: Malformed CEP, unknown CEP, or address without coordinates
/// - **429 Too Many Requests**: An upstream provider's rate limit was reached
/// - **503 Service Unavailable**: Too many lookups in flight, or every provider failed
/// - **504 Gateway Timeout**: The lookup deadline expired
pub async fn coordinates_handler(
    Path(cep): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CoordinatesResponse>, AppError> {
    let cep = normalize_cep(&cep).map_err(|e| LookupError::InvalidInput(e.to_string()))?;

    let coordinate = state.lookup_service.execute(&cep).await?;

    Ok(Json(CoordinatesResponse::new(cep, coordinate)))
}
