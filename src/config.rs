use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::retry::RetryPolicy;

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "LISTEN_DRILL_API_URL";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub retry: RetryConfig,
  pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Freshness window for cached reads
  pub cache_ttl_secs: u64,
  /// Post answers and final scores back to the server
  pub report_progress: bool,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000".to_string(),
      cache_ttl_secs: DEFAULT_TTL.as_secs(),
      report_progress: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub base_delay_ms: u64,
  /// Deadline per attempt; 0 disables it
  pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay_ms: 1000,
      attempt_timeout_ms: 15_000,
    }
  }
}

impl RetryConfig {
  pub fn to_policy(&self) -> RetryPolicy {
    let policy = RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms));
    match self.attempt_timeout_ms {
      0 => policy,
      ms => policy.with_attempt_timeout(Duration::from_millis(ms)),
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
  /// Stored sessions older than this are discarded
  pub staleness_hours: i64,
  /// Session database path (defaults to the data directory)
  pub database: Option<PathBuf>,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      staleness_hours: 24,
      database: None,
    }
  }
}

impl SessionConfig {
  /// Age after which a stored session is discarded.
  pub fn staleness(&self) -> Result<chrono::TimeDelta> {
    if self.staleness_hours < 0 {
      return Err(eyre!(
        "session.staleness_hours must not be negative, got {}",
        self.staleness_hours
      ));
    }
    chrono::TimeDelta::try_hours(self.staleness_hours)
      .ok_or_else(|| eyre!("session.staleness_hours is out of range: {}", self.staleness_hours))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./listen-drill.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/listen-drill/config.yaml
  ///
  /// Without a file every setting takes its default. `LISTEN_DRILL_API_URL`
  /// overrides the API base URL either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      if !url.trim().is_empty() {
        config.api.base_url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("listen-drill.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("listen-drill").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.session.staleness()?;
    Ok(config)
  }
}
