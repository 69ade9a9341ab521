//! API route configuration.

use crate::api::handlers::coordinates_handler;
use crate::state::AppState;
use axum::{Router, routing::get};

/// Lookup routes.
///
/// # Endpoints
///
/// - `GET /cep/{cep}` - Coordinates and precision for a CEP
pub fn lookup_routes() -> Router<AppState> {
    Router::new().route("/cep/{cep}", get(coordinates_handler))
}
