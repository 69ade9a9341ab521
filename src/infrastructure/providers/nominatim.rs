//! Nominatim geocoding source (OpenStreetMap).

use serde::Deserialize;
use url::Url;

use super::adapter::ProviderSource;
use crate::domain::entities::{GeoPoint, GeocodedPlace, OsmPlace};
use crate::domain::lookup::Lookup;

pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    place_rank: Option<u32>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    display_name: String,
}

/// Searches Brazil only and keeps the best match. The public instance allows
/// one request per second and requires an identifying User-Agent.
#[derive(Debug, Clone)]
pub struct NominatimSource {
    base_url: String,
}

impl NominatimSource {
    pub fn new() -> Self {
        Self::with_base_url(NOMINATIM_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for NominatimSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderSource<GeocodedPlace> for NominatimSource {
    fn name(&self) -> &str {
        "nominatim"
    }

    fn endpoint(&self, address: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("q", address),
                ("format", "jsonv2"),
                ("countrycodes", "br"),
                ("limit", "1"),
            ],
        )
    }

    fn parse(&self, body: &str) -> Result<Lookup<GeocodedPlace>, String> {
        let places: Vec<NominatimPlace> = serde_json::from_str(body).map_err(|e| e.to_string())?;

        let Some(place) = places.into_iter().next() else {
            return Ok(Lookup::NotFound);
        };
        let point = GeoPoint::parse(&place.lat, &place.lon)
            .ok_or_else(|| format!("invalid coordinates {}, {}", place.lat, place.lon))?;

        Ok(Lookup::Found(GeocodedPlace::new(
            point,
            OsmPlace {
                rank: place.place_rank,
                kind: place.kind,
                category: place.category,
            },
            place.display_name,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Precision;

    #[test]
    fn test_endpoint_encodes_query() {
        let url = NominatimSource::new()
            .endpoint("Avenida Paulista, São Paulo, SP, Brasil")
            .unwrap();

        assert_eq!(url.host_str(), Some("nominatim.openstreetmap.org"));
        let query: Vec<_> = url.query_pairs().collect();
        assert!(query.contains(&("q".into(), "Avenida Paulista, São Paulo, SP, Brasil".into())));
        assert!(query.contains(&("countrycodes".into(), "br".into())));
    }

    #[test]
    fn test_parse_first_match() {
        let body = r#"[{
            "place_id": 1,
            "lat": "-23.5614",
            "lon": "-46.6559",
            "category": "highway",
            "type": "primary",
            "place_rank": 26,
            "display_name": "Avenida Paulista, Bela Vista, São Paulo"
        }]"#;

        let place = NominatimSource::new().parse(body).unwrap().found().unwrap();

        assert_eq!(place.point, GeoPoint::new(-23.5614, -46.6559));
        assert_eq!(place.precision(), Precision::Rooftop);
    }

    #[test]
    fn test_empty_result_is_not_found() {
        assert_eq!(NominatimSource::new().parse("[]"), Ok(Lookup::NotFound));
    }
}
