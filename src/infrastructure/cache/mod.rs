//! Cache-aside layer shared by every resolution stage.
//!
//! - [`CacheStore`] - single-flight `get_or_fetch` over a [`KeyValueStore`](crate::infrastructure::store::KeyValueStore)
//! - [`CachePolicy`] - TTLs, pending-fetch ceiling and deadline for one namespace
//! - [`CacheEntry`] - the stored value, positive or negative

mod cache_store;
mod entry;

pub use cache_store::{CacheStore, DEFAULT_PEER_POLL_INTERVAL};
pub use entry::{CacheEntry, CachePolicy, TtlClass};
