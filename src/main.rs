mod api;
mod app;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod logging;
mod retry;
mod session;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::api::ApiClient;
use crate::config::Config;
use crate::db::Database;
use crate::retry::with_retry;
use crate::session::{PracticeSession, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "listen-drill")]
#[command(about = "Listening comprehension practice in the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/listen-drill/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// API base URL, overriding the config file
  #[arg(long, global = true)]
  api_url: Option<String>,

  /// Log at debug level
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
  /// Practice the questions for a piece of content
  Practice {
    /// Content id to practice
    content_id: String,
  },
  /// List content available for practice, or show one item
  Contents {
    /// Show only this content id
    content_id: Option<String>,
  },
  /// Submit source content for question generation
  Submit {
    /// URL of the source content
    url: String,

    /// Difficulty level
    #[arg(short, long, default_value = "intermediate")]
    level: String,
  },
  /// Delete content from the server
  Delete {
    content_id: String,
  },
  /// Show practice metrics recorded by the server
  Stats,
  /// Discard the stored practice session
  Forget,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = logging::init(args.verbose)?;

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.base_url = url;
  }
  info!(api = %config.api.base_url, "starting");

  match args.command {
    CliCommand::Practice { content_id } => practice(config, content_id).await,
    CliCommand::Contents { content_id } => list_contents(&config, content_id.as_deref()).await,
    CliCommand::Submit { url, level } => submit(&config, &url, &level).await,
    CliCommand::Delete { content_id } => {
      let api = ApiClient::new(&config.api)?;
      api
        .delete_content(&content_id)
        .await
        .map_err(|e| eyre!("Failed to delete {}: {}", content_id, e))?;
      println!("Deleted {}", content_id);
      Ok(())
    }
    CliCommand::Stats => show_stats(&config).await,
    CliCommand::Forget => {
      session_store(&config)?.clear();
      println!("Stored session discarded");
      Ok(())
    }
  }
}

fn session_store(config: &Config) -> Result<SessionStore<Database>> {
  let db = match &config.session.database {
    Some(path) => Database::open_at(path)?,
    None => Database::open()?,
  };
  Ok(SessionStore::new(Arc::new(db)).with_staleness(config.session.staleness()?))
}

async fn practice(config: Config, content_id: String) -> Result<()> {
  let api = ApiClient::new(&config.api)?;
  let store = session_store(&config)?;
  let policy = config.retry.to_policy();
  let report_progress = config.api.report_progress;

  let mut app = app::App::new(config.api.base_url.clone(), content_id, |events| {
    PracticeSession::new(api, store, policy, events).with_progress_reporting(report_progress)
  });
  app.run().await
}

async fn list_contents(config: &Config, content_id: Option<&str>) -> Result<()> {
  let api = ApiClient::new(&config.api)?;
  let policy = config.retry.to_policy();

  let contents = match content_id {
    Some(id) => vec![with_retry(&policy, || api.get_content(id))
      .await
      .map_err(|e| eyre!("Failed to load content {}: {}", id, e))?],
    None => with_retry(&policy, || api.list_contents())
      .await
      .map_err(|e| eyre!("Failed to list contents: {}", e))?,
  };

  if contents.is_empty() {
    println!("No content available");
  }
  for content in contents {
    match content.level {
      Some(level) => println!("{}\t{}\t[{}]", content.id, content.title, level),
      None => println!("{}\t{}", content.id, content.title),
    }
  }
  Ok(())
}

async fn show_stats(config: &Config) -> Result<()> {
  let api = ApiClient::new(&config.api)?;
  let policy = config.retry.to_policy();

  let stats = with_retry(&policy, || api.stats())
    .await
    .map_err(|e| eyre!("Failed to load stats: {}", e))?;

  if stats.metrics.is_empty() {
    println!("No stats recorded");
  }
  for (name, value) in &stats.metrics {
    println!("{}\t{}", name, value);
  }
  Ok(())
}

async fn submit(config: &Config, url: &str, level: &str) -> Result<()> {
  let api = ApiClient::new(&config.api)?;

  // Not idempotent, so a single attempt
  let processed = api
    .submit_content(url, level)
    .await
    .map_err(|e| eyre!("Failed to submit content: {}", e))?;

  println!(
    "{}\t{} questions\t[{}]",
    processed.content_id,
    processed.question_count,
    processed.level.as_deref().unwrap_or(level)
  );
  Ok(())
}
