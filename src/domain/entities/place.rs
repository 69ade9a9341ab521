//! Geocoded place entity produced by geocoding providers.

use serde::{Deserialize, Serialize};

use super::coordinate::{GeoPoint, Precision};
use crate::domain::precision::classify_osm;

/// OSM-style metadata describing what a geocoder matched.
///
/// Nominatim reports all three fields; Photon has no rank and reports its
/// `type` as `kind` and `osm_key` as `category`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsmPlace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A geocoding match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    pub point: GeoPoint,
    pub place: OsmPlace,
    #[serde(default)]
    pub display_name: String,
}

impl GeocodedPlace {
    pub fn new(point: GeoPoint, place: OsmPlace, display_name: impl Into<String>) -> Self {
        Self {
            point,
            place,
            display_name: display_name.into(),
        }
    }

    /// Scores the match from its OSM metadata.
    pub fn precision(&self) -> Precision {
        classify_osm(
            self.place.rank,
            self.place.kind.as_deref(),
            self.place.category.as_deref(),
        )
    }
}
