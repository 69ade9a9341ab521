//! AwesomeAPI CEP address source (`cep.awesomeapi.com.br`).

use serde::Deserialize;
use url::Url;

use super::adapter::ProviderSource;
use crate::domain::entities::{Address, GeoPoint};
use crate::domain::lookup::Lookup;

pub const AWESOMEAPI_BASE_URL: &str = "https://cep.awesomeapi.com.br/json/";

#[derive(Debug, Deserialize)]
struct AwesomeApiPayload {
    cep: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    district: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    lat: String,
    #[serde(default)]
    lng: String,
}

/// Returns `lat`/`lng` strings with every address. Unknown CEPs get 404 and
/// malformed ones 400.
#[derive(Debug, Clone)]
pub struct AwesomeApiSource {
    base_url: String,
}

impl AwesomeApiSource {
    pub fn new() -> Self {
        Self::with_base_url(AWESOMEAPI_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for AwesomeApiSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderSource<Address> for AwesomeApiSource {
    fn name(&self) -> &str {
        "awesomeapi"
    }

    fn endpoint(&self, cep: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)?.join(cep)
    }

    fn parse(&self, body: &str) -> Result<Lookup<Address>, String> {
        let payload: AwesomeApiPayload = serde_json::from_str(body).map_err(|e| e.to_string())?;
        let location = GeoPoint::parse(&payload.lat, &payload.lng);

        Ok(Lookup::Found(
            Address::new(
                payload.cep,
                payload.address,
                payload.district,
                payload.city,
                payload.state,
            )
            .with_location(location),
        ))
    }

    fn is_not_found_status(&self, status: u16) -> bool {
        status == 400 || status == 404
    }
}
