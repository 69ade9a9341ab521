//! Maps heterogeneous provider metadata to a [`Precision`] tier.
//!
//! Both classifiers are total and deterministic. They only look at the
//! metadata handed in, so they can be called from any layer.

use crate::domain::entities::{Address, Precision};

/// Minimum OSM `place_rank` treated as a street or building match.
pub const ROOFTOP_MIN_RANK: u32 = 26;

/// Minimum OSM `place_rank` treated as a neighborhood match.
pub const NEIGHBORHOOD_MIN_RANK: u32 = 16;

const STREET_LEVEL_KINDS: &[&str] = &[
    "house",
    "building",
    "street",
    "road",
    "residential",
    "primary",
    "secondary",
    "tertiary",
    "trunk",
    "unclassified",
    "living_street",
    "pedestrian",
    "service",
    "house_number",
];

const STREET_LEVEL_CATEGORIES: &[&str] = &["highway", "building"];

const NEIGHBORHOOD_LEVEL_KINDS: &[&str] = &[
    "suburb",
    "neighbourhood",
    "neighborhood",
    "quarter",
    "city_block",
    "city_district",
    "district",
    "borough",
    "hamlet",
    "locality",
    "postcode",
];

/// Classifies an OSM-style match (Nominatim, Photon).
///
/// - rank ≥ 26, or a street-level type/category → [`Precision::Rooftop`]
/// - rank in `[16, 26)`, or a neighborhood-level type → [`Precision::Neighborhood`]
/// - anything else → [`Precision::City`]
pub fn classify_osm(rank: Option<u32>, kind: Option<&str>, category: Option<&str>) -> Precision {
    let kind = kind.map(|k| k.trim().to_ascii_lowercase());
    let category = category.map(|c| c.trim().to_ascii_lowercase());
    let kind_in = |table: &[&str]| kind.as_deref().is_some_and(|k| table.contains(&k));

    let street_level = rank.is_some_and(|r| r >= ROOFTOP_MIN_RANK)
        || kind_in(STREET_LEVEL_KINDS)
        || category
            .as_deref()
            .is_some_and(|c| STREET_LEVEL_CATEGORIES.contains(&c));
    if street_level {
        return Precision::Rooftop;
    }

    let neighborhood_level = rank
        .is_some_and(|r| (NEIGHBORHOOD_MIN_RANK..ROOFTOP_MIN_RANK).contains(&r))
        || kind_in(NEIGHBORHOOD_LEVEL_KINDS);
    if neighborhood_level {
        return Precision::Neighborhood;
    }

    Precision::City
}

/// Classifies a structured address by which fields are filled.
pub fn classify_fields(street: &str, neighborhood: &str) -> Precision {
    if !street.trim().is_empty() {
        Precision::Rooftop
    } else if !neighborhood.trim().is_empty() {
        Precision::Neighborhood
    } else {
        Precision::City
    }
}

/// Classifies an address whose provider returned coordinates directly.
pub fn classify_address(address: &Address) -> Precision {
    classify_fields(&address.street, &address.neighborhood)
}
