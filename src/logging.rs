//! Log to a file in the data directory; the terminal belongs to the UI.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "LISTEN_DRILL_LOG";

fn default_directive(verbose: bool) -> &'static str {
  if verbose {
    "listen_drill=debug,hyper=warn,reqwest=warn"
  } else {
    "listen_drill=info,hyper=warn,reqwest=warn"
  }
}

pub fn log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("listen-drill").join("logs"))
}

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(verbose: bool) -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let filter = EnvFilter::try_from_env(LOG_ENV)
    .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

  let appender = tracing_appender::rolling::daily(&dir, "listen-drill.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_directive_parses() {
    for verbose in [false, true] {
      assert!(EnvFilter::try_new(default_directive(verbose)).is_ok());
    }
  }

  #[test]
  fn test_log_dir_is_namespaced() {
    let dir = log_dir().unwrap();
    assert!(dir.ends_with("listen-drill/logs"));
  }
}
