//! Domain layer containing lookup entities and the resolution contracts.
//!
//! This module defines the data produced by address and geocoding providers,
//! the tagged result variants exchanged between layers, and the pure
//! precision classifier. It has no dependencies on infrastructure.
//!
//! # Architecture
//!
//! - [`entities`] - Addresses, points, geocoded places and final coordinates
//! - [`lookup`] - [`lookup::Lookup`] and [`lookup::ProviderOutcome`] variants
//! - [`errors`] - The lookup failure taxonomy
//! - [`provider`] - The adapter contract every external API implements
//! - [`precision`] - Provider metadata to [`entities::Precision`] mapping
//!
//! # Resolution Flow
//!
//! 1. A CEP is normalized by [`crate::utils::cep`]
//! 2. The address chain resolves it into an [`entities::Address`]
//! 3. If the address has no coordinates, the geocoding chain resolves it
//!    into an [`entities::GeocodedPlace`]
//! 4. [`precision`] scores whichever metadata produced the final point

pub mod entities;
pub mod errors;
pub mod lookup;
pub mod precision;
pub mod provider;
