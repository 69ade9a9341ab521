//! Points, precision tiers and the final coordinate answer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parses a point from the string pair most Brazilian APIs return.
    ///
    /// Returns `None` for blank or non-numeric values and for points outside
    /// the valid latitude/longitude ranges.
    pub fn parse(latitude: &str, longitude: &str) -> Option<Self> {
        let latitude: f64 = latitude.trim().parse().ok()?;
        let longitude: f64 = longitude.trim().parse().ok()?;
        Self::checked(latitude, longitude)
    }

    /// Returns the point only if both components are finite and in range.
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then(|| Self::new(latitude, longitude))
    }
}

/// Qualitative accuracy of a resolved coordinate.
///
/// Ordered from most to least specific, so `Rooftop < Neighborhood < City`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Precision {
    Rooftop,
    Neighborhood,
    City,
}

impl Precision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rooftop => "ROOFTOP",
            Self::Neighborhood => "NEIGHBORHOOD",
            Self::City => "CITY",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a CEP lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub precision: Precision,
}

impl Coordinate {
    pub fn new(point: GeoPoint, precision: Precision) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            precision,
        }
    }
}
