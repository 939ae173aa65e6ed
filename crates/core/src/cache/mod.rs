//! Response cache: keys, admission policy, stored encoding and storage.
//!
//! This module provides:
//!
//! - `METHOD:path` cache keys
//! - An ordered header bag with the transport-header stripping policy
//! - TTL derivation from `Cache-Control: max-age`
//! - A byte encoding for cached responses with corruption detection
//! - The [`CacheStore`] capability and an in-memory LRU implementation

pub mod entry;
pub mod headers;
pub mod key;
pub mod store;
pub mod ttl;

pub use entry::CacheEntry;
pub use headers::{HeaderBag, TRANSPORT_HEADERS};
pub use key::CacheKey;
pub use store::{CacheStore, MemoryStore};
pub use ttl::{max_age, ttl_from_headers};
