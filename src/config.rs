use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://graphql.contentful.com";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub contentful: ContentfulConfig,
  #[serde(default)]
  pub listing: ListingConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Read draft content with the preview token
  #[serde(default)]
  pub preview: bool,
  /// Custom title for header (defaults to the space id)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentfulConfig {
  /// Space id; falls back to CONTENTFUL_SPACE_ID when not set here
  pub space_id: Option<String>,
  #[serde(default = "default_environment")]
  pub environment: String,
  #[serde(default = "default_endpoint")]
  pub endpoint: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ContentfulConfig {
  fn default() -> Self {
    Self {
      space_id: None,
      environment: default_environment(),
      endpoint: default_endpoint(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ContentfulConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
  /// Previous/next page navigation
  #[default]
  Paged,
  /// Pages are appended as the selection nears the end of the list
  Infinite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default)]
  pub mode: ListMode,
  /// Rows from the end of the list that trigger loading the next page
  #[serde(default = "default_prefetch_threshold")]
  pub prefetch_threshold: usize,
}

impl Default for ListingConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      mode: ListMode::default(),
      prefetch_threshold: default_prefetch_threshold(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// In-process cache, dropped on exit
  #[default]
  Memory,
  /// Persistent SQLite cache in the data directory
  Sqlite,
  /// Caching disabled
  None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  /// Serve stale entries when a refresh fails
  #[serde(default)]
  pub offline: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::default(),
      stale_secs: default_stale_secs(),
      offline: false,
    }
  }
}

fn default_environment() -> String {
  "master".to_string()
}

fn default_endpoint() -> String {
  DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_page_size() -> u32 {
  9
}

fn default_prefetch_threshold() -> usize {
  3
}

fn default_stale_secs() -> u64 {
  crate::cache::DEFAULT_STALE_TIME.as_secs()
}

/// Contentful access credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub space_id: String,
  pub access_token: Option<String>,
  pub preview_access_token: Option<String>,
}

impl Credentials {
  /// Resolve credentials from the config file and environment.
  ///
  /// Every value is required: a missing space id or token fails at startup
  /// rather than on the first request.
  pub fn load(config: &ContentfulConfig) -> Result<Self> {
    let space_id = match config.space_id.clone().filter(|s| !s.is_empty()) {
      Some(id) => id,
      None => env_var("SPACE_ID")?,
    };

    Ok(Self {
      space_id,
      access_token: Some(env_var("ACCESS_TOKEN")?),
      preview_access_token: Some(env_var("PREVIEW_ACCESS_TOKEN")?),
    })
  }
}

/// Read `CONTENTFUL_<name>`, then `<name>`. An empty value counts as unset.
fn env_var(name: &str) -> Result<String> {
  let prefixed = format!("CONTENTFUL_{}", name);
  let value = [prefixed.as_str(), name]
    .into_iter()
    .filter_map(|key| std::env::var(key).ok())
    .find(|v| !v.trim().is_empty())
    .ok_or_else(|| eyre!("{} not found. Set {} or {} in the environment.", name, prefixed, name));
  value
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./folio.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/folio/config.yaml
  ///
  /// Without a file every setting takes its default.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("folio.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("folio").join("config.yaml");
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
    let config: Config = serde_yaml::from_str(contents)?;
    if config.listing.page_size == 0 {
      return Err(eyre!("listing.page_size must be greater than zero"));
    }
    Ok(config)
  }

  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.cache.stale_secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_from_empty_document() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.contentful.environment, "master");
    assert_eq!(config.contentful.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.listing.page_size, 9);
    assert_eq!(config.listing.mode, ListMode::Paged);
    assert_eq!(config.cache.backend, CacheBackend::Memory);
    assert_eq!(config.stale_time(), Duration::from_secs(300));
    assert!(!config.preview);
  }

  #[test]
  fn test_full_document() {
    let yaml = r#"
contentful:
  space_id: abc123
  environment: staging
listing:
  page_size: 3
  mode: infinite
cache:
  backend: sqlite
  stale_secs: 60
  offline: true
preview: true
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.contentful.space_id.as_deref(), Some("abc123"));
    assert_eq!(config.contentful.environment, "staging");
    assert_eq!(config.listing.page_size, 3);
    assert_eq!(config.listing.mode, ListMode::Infinite);
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    assert!(config.cache.offline);
    assert!(config.preview);
  }

  #[test]
  fn test_zero_page_size_rejected() {
    assert!(Config::parse("listing:\n  page_size: 0\n").is_err());
  }

  #[test]
  fn test_empty_prefixed_var_falls_back_to_plain_name() {
    std::env::set_var("CONTENTFUL_FOLIO_TEST_FALLBACK", "");
    std::env::set_var("FOLIO_TEST_FALLBACK", "plain-token");
    assert_eq!(env_var("FOLIO_TEST_FALLBACK").unwrap(), "plain-token");

    std::env::set_var("CONTENTFUL_FOLIO_TEST_PREFERRED", "prefixed-token");
    std::env::set_var("FOLIO_TEST_PREFERRED", "plain-token");
    assert_eq!(env_var("FOLIO_TEST_PREFERRED").unwrap(), "prefixed-token");
  }

  #[test]
  fn test_blank_vars_are_missing() {
    std::env::set_var("CONTENTFUL_FOLIO_TEST_BLANK", "  ");
    std::env::set_var("FOLIO_TEST_BLANK", "");
    let err = env_var("FOLIO_TEST_BLANK").unwrap_err();
    assert!(err.to_string().contains("CONTENTFUL_FOLIO_TEST_BLANK"));
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/folio.yaml"))).is_err());
  }
}
