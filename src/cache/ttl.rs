//! In-memory cache with per-entry time-to-live.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Freshness window used when no explicit TTL is given.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
  value: V,
  expires_at: Instant,
}

/// Key/value cache whose entries expire after a TTL.
///
/// Expired entries are evicted lazily: `get` treats an entry past its
/// expiry as absent and drops it. Nothing sweeps in the background.
#[derive(Debug)]
pub struct TtlCache<V> {
  entries: HashMap<String, CacheEntry<V>>,
  default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
  pub fn new(default_ttl: Duration) -> Self {
    Self {
      entries: HashMap::new(),
      default_ttl,
    }
  }

  /// Look up a live entry, evicting it if it has expired.
  pub fn get(&mut self, key: &str) -> Option<V> {
    let expired = match self.entries.get(key) {
      Some(entry) => Instant::now() > entry.expires_at,
      None => return None,
    };

    if expired {
      self.entries.remove(key);
      return None;
    }

    self.entries.get(key).map(|entry| entry.value.clone())
  }

  /// Store a value for `ttl`, replacing any previous entry for the key.
  pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
    self.entries.insert(
      key.into(),
      CacheEntry {
        value,
        expires_at: Instant::now() + ttl,
      },
    );
  }

  /// Store a value using the cache's default TTL.
  pub fn insert(&mut self, key: impl Into<String>, value: V) {
    let ttl = self.default_ttl;
    self.set(key, value, ttl);
  }

  /// Drop an entry. Returns whether one was present.
  pub fn invalidate(&mut self, key: &str) -> bool {
    self.entries.remove(key).is_some()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Number of stored entries, including expired ones not yet evicted.
  pub fn len(&self) -> usize {
    self.entries.len()
  }
}

impl<V: Clone> Default for TtlCache<V> {
  fn default() -> Self {
    Self::new(DEFAULT_TTL)
  }
}
