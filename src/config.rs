use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL of the quiz server; relative asset URLs resolve against it
  pub origin: String,
  /// Name of the current cache generation
  pub cache_name: String,
  /// Page served when a static request misses both cache and network
  pub offline_url: String,
  /// Assets fetched and cached on install, in order
  pub assets: Vec<String>,
  /// URL fragments that mark a request as mutating
  pub mutating_markers: Vec<String>,
  /// The only sync tag that triggers a queue replay
  pub sync_tag: String,
  /// Offline queue database (defaults to $XDG_DATA_HOME/quiz-sw/offline.db)
  pub database: Option<PathBuf>,
  /// Overall deadline per request; unset means fetches never time out
  pub request_timeout_secs: Option<u64>,
  /// Write logs to a daily rolling file instead of stderr
  pub log_file: Option<PathBuf>,
  pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
  /// URL probed to detect connectivity (defaults to the origin)
  pub probe_url: Option<String>,
  pub interval_secs: u64,
}

impl Default for WatchConfig {
  fn default() -> Self {
    Self {
      probe_url: None,
      interval_secs: 5,
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:8080".to_string(),
      cache_name: "quiz-app-v1".to_string(),
      offline_url: "/offline.html".to_string(),
      assets: vec![
        "/".to_string(),
        "/offline.html".to_string(),
        "https://unpkg.com/htmx.org@1.9.10".to_string(),
        "https://cdn.tailwindcss.com".to_string(),
        "/manifest.json".to_string(),
      ],
      mutating_markers: vec![
        "/api/".to_string(),
        "/submit-question".to_string(),
        "/check-answer".to_string(),
      ],
      sync_tag: "sync-questions".to_string(),
      database: None,
      request_timeout_secs: None,
      log_file: None,
      watch: WatchConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./quiz-sw.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/quiz-sw/config.yaml
  ///
  /// Falls back to the built-in defaults when no file is found.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("quiz-sw.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("quiz-sw").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    self.origin_url()?;
    if self.cache_name.trim().is_empty() {
      return Err(eyre!("cache_name must not be empty"));
    }
    if self.sync_tag.trim().is_empty() {
      return Err(eyre!("sync_tag must not be empty"));
    }
    Ok(())
  }

  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }

  /// Resolve a possibly relative URL against the origin.
  pub fn resolve(&self, url: &str) -> Result<String> {
    let resolved = self
      .origin_url()?
      .join(url)
      .map_err(|e| eyre!("Invalid URL '{}': {}", url, e))?;
    Ok(resolved.to_string())
  }

  pub fn request_timeout(&self) -> Option<Duration> {
    self.request_timeout_secs.map(Duration::from_secs)
  }

  /// Offline queue database location.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.database {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("quiz-sw").join("offline.db"))
  }

  pub fn probe_url(&self) -> Result<String> {
    match &self.watch.probe_url {
      Some(url) => self.resolve(url),
      None => self.resolve("/"),
    }
  }
}
