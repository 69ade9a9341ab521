//! Cache keys for free-form address queries.

use sha2::{Digest, Sha256};

/// Lowercases and collapses whitespace so trivially different spellings of
/// the same query collide.
pub fn canonicalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Hex SHA-256 of the canonical address. Keeps geocode keys short and free of
/// characters the store would have to escape.
pub fn address_cache_key(address: &str) -> String {
    hex::encode(Sha256::digest(canonicalize_address(address).as_bytes()))
}
