//! Input normalization helpers used to derive cache keys.
//!
//! - [`cep`] - CEP validation and reduction to 8 digits
//! - [`address_key`] - Canonical hashed keys for geocoding queries

pub mod address_key;
pub mod cep;
