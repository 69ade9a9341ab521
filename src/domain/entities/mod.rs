//! Core domain entities for CEP resolution.
//!
//! # Entity Types
//!
//! - [`Address`] - A postal address returned by address providers
//! - [`GeoPoint`] - A latitude/longitude pair
//! - [`GeocodedPlace`] - A point plus the OSM-style metadata of the match
//! - [`Coordinate`] - The final answer: a point with its [`Precision`]
//!
//! All entities are serializable because every stage result is cached as JSON.

pub mod address;
pub mod coordinate;
pub mod place;

pub use address::Address;
pub use coordinate::{Coordinate, GeoPoint, Precision};
pub use place::{GeocodedPlace, OsmPlace};
