//! Address entity produced by address providers.

use serde::{Deserialize, Serialize};

use super::coordinate::GeoPoint;

/// A postal address resolved from a CEP.
///
/// Fields that a provider does not know are stored as empty strings so the
/// precision classifier can inspect presence without caring which provider
/// filled them. `location` is set only by providers that return coordinates
/// directly, which lets the lookup skip geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub cep: String,
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl Address {
    /// Creates an address without coordinates.
    pub fn new(
        cep: impl Into<String>,
        street: impl Into<String>,
        neighborhood: impl Into<String>,
        city: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            cep: cep.into(),
            street: street.into().trim().to_string(),
            neighborhood: neighborhood.into().trim().to_string(),
            city: city.into().trim().to_string(),
            region: region.into().trim().to_string(),
            location: None,
        }
    }

    /// Attaches coordinates returned by the address provider itself.
    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    /// Builds the free-form query handed to geocoding providers.
    ///
    /// Empty components are skipped and the country is always appended, e.g.
    /// `"Avenida Paulista, Bela Vista, São Paulo, SP, Brasil"`.
    pub fn geocoding_query(&self) -> String {
        [
            self.street.as_str(),
            self.neighborhood.as_str(),
            self.city.as_str(),
            self.region.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .chain(std::iter::once("Brasil"))
        .collect::<Vec<_>>()
        .join(", ")
    }
}
