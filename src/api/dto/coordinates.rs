//! DTOs for the CEP lookup endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{Coordinate, Precision};

/// Coordinates resolved for a CEP.
///
/// ```json
/// {
///   "cep": "01310100",
///   "latitude": -23.5613991,
///   "longitude": -46.6558819,
///   "precision": "ROOFTOP"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CoordinatesResponse {
    pub cep: String,
    pub latitude: f64,
    pub longitude: f64,
    pub precision: Precision,
}

impl CoordinatesResponse {
    pub fn new(cep: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            cep: cep.into(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            precision: coordinate.precision,
        }
    }
}
