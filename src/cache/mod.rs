//! Process-lifetime caching for outbound read requests.
//!
//! The cache is never persisted: it only short-circuits repeated reads
//! within a single run. Entries expire after a TTL and are evicted lazily.

mod ttl;

pub use ttl::{TtlCache, DEFAULT_TTL};
