use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Origin the worker controls; relative manifest paths resolve against it
  #[serde(deserialize_with = "deserialize_url")]
  pub origin: Url,
  /// Name of the current cache generation. Bump it to invalidate old caches.
  #[serde(default = "default_generation")]
  pub generation: String,
  /// Own-origin paths populated at install time
  #[serde(default)]
  pub precache: Vec<String>,
  /// Absolute cross-origin URLs populated at install time
  #[serde(default)]
  pub cross_origin: Vec<String>,
  /// HTML file to serve instead of the built-in offline page
  pub offline_page: Option<PathBuf>,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub network: NetworkConfig,
  #[serde(default)]
  pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Cache database path (default: $XDG_DATA_HOME/offline-proxy/cache.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
    }
  }
}

/// Defaults applied to push notifications whose payload omits a field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub tag: String,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      title: "Notification".to_string(),
      body: "You have a new notification.".to_string(),
      icon: "/static/icons/icon-192x192.png".to_string(),
      badge: "/static/icons/icon-96x96.png".to_string(),
      tag: "offline-proxy-notification".to_string(),
    }
  }
}

fn default_generation() -> String {
  concat!("offline-proxy-v", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn deserialize_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let s = String::deserialize(deserializer)?;
  Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offline-proxy.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offline-proxy/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/offline-proxy/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("offline-proxy.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offline-proxy").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// The precache manifest as absolute URLs: own-origin paths first, then
  /// cross-origin URLs, in configured order.
  pub fn precache_urls(&self) -> Result<Vec<Url>> {
    let own = self.precache.iter().map(|path| {
      self
        .origin
        .join(path)
        .map_err(|e| eyre!("Invalid precache path '{}': {}", path, e))
    });

    let cross = self.cross_origin.iter().map(|url| {
      Url::parse(url).map_err(|e| eyre!("Invalid cross-origin URL '{}': {}", url, e))
    });

    own.chain(cross).collect()
  }

  /// Resolve the cache database path.
  pub fn storage_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.storage.path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("offline-proxy").join("cache.db"))
  }

  /// Read the configured offline page override, if any.
  pub fn offline_document(&self) -> Result<Option<String>> {
    self
      .offline_page
      .as_deref()
      .map(|path| {
        std::fs::read_to_string(path)
          .map_err(|e| eyre!("Failed to read offline page {}: {}", path.display(), e))
      })
      .transpose()
  }
}
