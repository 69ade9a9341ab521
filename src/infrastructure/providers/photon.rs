//! Photon geocoding source (`photon.komoot.io`).

use serde::Deserialize;
use url::Url;

use super::adapter::ProviderSource;
use crate::domain::entities::{GeoPoint, GeocodedPlace, OsmPlace};
use crate::domain::lookup::Lookup;

pub const PHOTON_BASE_URL: &str = "https://photon.komoot.io/api/";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: longitude first.
    coordinates: [f64; 2],
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    osm_key: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

/// Photon reports no rank, so precision comes from its `type` and `osm_key`.
#[derive(Debug, Clone)]
pub struct PhotonSource {
    base_url: String,
}

impl PhotonSource {
    pub fn new() -> Self {
        Self::with_base_url(PHOTON_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for PhotonSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderSource<GeocodedPlace> for PhotonSource {
    fn name(&self) -> &str {
        "photon"
    }

    fn endpoint(&self, address: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(&self.base_url, &[("q", address), ("limit", "1")])
    }

    fn parse(&self, body: &str) -> Result<Lookup<GeocodedPlace>, String> {
        let collection: FeatureCollection =
            serde_json::from_str(body).map_err(|e| e.to_string())?;

        let Some(feature) = collection.features.into_iter().next() else {
            return Ok(Lookup::NotFound);
        };
        let [longitude, latitude] = feature.geometry.coordinates;
        let point = GeoPoint::checked(latitude, longitude)
            .ok_or_else(|| format!("invalid coordinates {}, {}", latitude, longitude))?;

        let properties = feature.properties;
        let display_name = [properties.name.as_deref(), properties.city.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Lookup::Found(GeocodedPlace::new(
            point,
            OsmPlace {
                rank: None,
                kind: properties.kind,
                category: properties.osm_key,
            },
            display_name,
        )))
    }
}
