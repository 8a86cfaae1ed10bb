mod app;
mod cache;
mod commands;
mod config;
mod contentful;
mod event;
mod feed;
mod query;
mod ui;

use clap::{Parser, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{CacheBackend, Config, Credentials, ListMode};
use crate::contentful::{CachedContentClient, ResourceType};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResourceArg {
  Articles,
  Talent,
}

impl From<ResourceArg> for ResourceType {
  fn from(arg: ResourceArg) -> Self {
    match arg {
      ResourceArg::Articles => ResourceType::Article,
      ResourceArg::Talent => ResourceType::Talent,
    }
  }
}

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "A terminal reader for Contentful-backed blogs")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./folio.yaml or $XDG_CONFIG_HOME/folio/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Read draft content through the preview API
  #[arg(long)]
  preview: bool,

  /// Listing style
  #[arg(short, long, value_enum)]
  mode: Option<ListMode>,

  /// Items per page
  #[arg(long)]
  page_size: Option<u32>,

  /// Content type to open with
  #[arg(short, long, value_enum, default_value = "articles")]
  resource: ResourceArg,

  /// Disable caching for this run
  #[arg(long)]
  no_cache: bool,
}

impl Args {
  /// Command-line flags take precedence over the config file.
  fn apply(&self, mut config: Config) -> Result<Config> {
    if self.preview {
      config.preview = true;
    }
    if let Some(mode) = self.mode {
      config.listing.mode = mode;
    }
    if let Some(page_size) = self.page_size {
      if page_size == 0 {
        return Err(eyre!("--page-size must be greater than zero"));
      }
      config.listing.page_size = page_size;
    }
    if self.no_cache {
      config.cache.backend = CacheBackend::None;
    }
    Ok(config)
  }
}

/// Log to a daily file; the terminal belongs to the UI.
fn init_logging() -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("folio")
    .join("logs");
  std::fs::create_dir_all(&log_dir)?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
    log_dir, "folio.log",
  ));

  let filter = EnvFilter::try_from_env("FOLIO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  let config = args.apply(Config::load(args.config.as_deref())?)?;

  // Fail before the terminal is taken over
  let credentials = Credentials::load(&config.contentful)?;
  let client = CachedContentClient::new(&config, credentials)?;

  tracing::info!(
    space = client.space_id(),
    preview = config.preview,
    mode = ?config.listing.mode,
    "starting"
  );

  let mut app = app::App::new(config, client, args.resource.into());
  app.run().await?;

  Ok(())
}
