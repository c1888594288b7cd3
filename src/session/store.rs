//! Persistence for the in-progress practice session.
//!
//! One session is kept at a time, in a single well-known slot. The slot
//! holds a JSON envelope with the save time, the serialized snapshot and
//! its SHA-256 digest. Anything that cannot be read back cleanly (bad
//! JSON, digest mismatch, broken invariants) counts as no session at all:
//! persistence problems are logged and never block practice.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::KeyValueStore;

use super::snapshot::SessionSnapshot;

/// Storage key of the session slot
pub const SESSION_SLOT: &str = "listen_drill.practice_session";

/// Snapshots older than this are discarded on load.
pub fn default_staleness() -> Duration {
  Duration::hours(24)
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
  saved_at: DateTime<Utc>,
  digest: String,
  payload: String,
}

fn digest(payload: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(payload.as_bytes());
  hex::encode(hasher.finalize())
}

pub struct SessionStore<S: KeyValueStore> {
  storage: Arc<S>,
  staleness: Duration,
}

impl<S: KeyValueStore> SessionStore<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      staleness: default_staleness(),
    }
  }

  pub fn with_staleness(mut self, staleness: Duration) -> Self {
    self.staleness = staleness;
    self
  }

  /// Persist `snapshot`, stamped with the current time.
  pub fn save(&self, snapshot: &SessionSnapshot) {
    self.save_at(snapshot, Utc::now());
  }

  pub fn save_at(&self, snapshot: &SessionSnapshot, now: DateTime<Utc>) {
    let mut snapshot = snapshot.clone();
    snapshot.saved_at = Some(now);

    let payload = match serde_json::to_string(&snapshot) {
      Ok(payload) => payload,
      Err(e) => {
        warn!("Failed to serialize session snapshot: {}", e);
        return;
      }
    };
    let envelope = Envelope {
      saved_at: now,
      digest: digest(&payload),
      payload,
    };

    let result = serde_json::to_string(&envelope)
      .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize envelope: {}", e))
      .and_then(|raw| self.storage.set(SESSION_SLOT, &raw));

    match result {
      Ok(()) => debug!(
        content_id = %snapshot.content_id,
        answered = snapshot.answers.len(),
        "session saved"
      ),
      Err(e) => warn!("Failed to save session: {}", e),
    }
  }

  /// Load the stored session for `content_id`, if one can be resumed.
  pub fn load(&self, content_id: &str) -> Option<SessionSnapshot> {
    self.load_at(content_id, Utc::now())
  }

  pub fn load_at(&self, content_id: &str, now: DateTime<Utc>) -> Option<SessionSnapshot> {
    let raw = match self.storage.get(SESSION_SLOT) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!("Failed to read stored session: {}", e);
        return None;
      }
    };

    let snapshot = match decode(&raw) {
      Ok(snapshot) => snapshot,
      Err(reason) => {
        warn!("Ignoring unreadable stored session: {}", reason);
        return None;
      }
    };

    if snapshot.content_id != content_id {
      debug!(
        stored = %snapshot.content_id,
        requested = %content_id,
        "stored session belongs to other content"
      );
      return None;
    }

    let saved_at = snapshot.saved_at.unwrap_or(now);
    if now - saved_at > self.staleness {
      info!(content_id = %content_id, %saved_at, "discarding stale session");
      self.clear();
      return None;
    }

    Some(snapshot)
  }

  /// Remove the stored session.
  pub fn clear(&self) {
    if let Err(e) = self.storage.remove(SESSION_SLOT) {
      warn!("Failed to clear stored session: {}", e);
    }
  }
}

/// Parse and verify an envelope, returning why it was rejected.
fn decode(raw: &str) -> Result<SessionSnapshot, String> {
  let envelope: Envelope = serde_json::from_str(raw).map_err(|e| e.to_string())?;

  if digest(&envelope.payload) != envelope.digest {
    return Err("digest mismatch".to_string());
  }

  let mut snapshot: SessionSnapshot =
    serde_json::from_str(&envelope.payload).map_err(|e| e.to_string())?;
  snapshot.validate().map_err(|e| e.to_string())?;
  snapshot.saved_at = Some(envelope.saved_at);

  Ok(snapshot)
}
