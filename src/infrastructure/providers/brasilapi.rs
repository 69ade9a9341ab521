//! BrasilAPI CEP v2 address source (`brasilapi.com.br`).

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::adapter::ProviderSource;
use crate::domain::entities::{Address, GeoPoint};
use crate::domain::lookup::Lookup;

pub const BRASILAPI_BASE_URL: &str = "https://brasilapi.com.br/api/cep/v2/";

#[derive(Debug, Deserialize)]
struct BrasilApiPayload {
    cep: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    neighborhood: Option<String>,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    coordinates: Option<Coordinates>,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    #[serde(default)]
    latitude: Value,
    #[serde(default)]
    longitude: Value,
}

/// BrasilAPI aggregates several upstreams and, when it can, returns the
/// coordinates of the CEP along with the address.
#[derive(Debug, Clone)]
pub struct BrasilApiSource {
    base_url: String,
}

impl BrasilApiSource {
    pub fn new() -> Self {
        Self::with_base_url(BRASILAPI_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for BrasilApiSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinates come back as strings, numbers or are left out entirely.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ProviderSource<Address> for BrasilApiSource {
    fn name(&self) -> &str {
        "brasilapi"
    }

    fn endpoint(&self, cep: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)?.join(cep)
    }

    fn parse(&self, body: &str) -> Result<Lookup<Address>, String> {
        let payload: BrasilApiPayload = serde_json::from_str(body).map_err(|e| e.to_string())?;

        let location = payload
            .location
            .and_then(|l| l.coordinates)
            .and_then(|c| GeoPoint::checked(number(&c.latitude)?, number(&c.longitude)?));

        let address = Address::new(
            payload.cep,
            payload.street.unwrap_or_default(),
            payload.neighborhood.unwrap_or_default(),
            payload.city,
            payload.state,
        )
        .with_location(location);

        Ok(Lookup::Found(address))
    }
}
