//! REST API layer for HTTP request/response handling.
//!
//! This layer translates HTTP requests into lookups and formats responses
//! according to the API contract. It holds no lookup logic of its own.
//!
//! # Modules
//!
//! - [`dto`] - Data Transfer Objects for response serialization
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Request tracing
//! - [`routes`] - Route configuration and composition

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
