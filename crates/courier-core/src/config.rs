//! Configuration management for the courier client.
//!
//! Loads configuration from ${COURIER_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `api.base_url`.
pub const BASE_URL_ENV: &str = "COURIER_BASE_URL";

/// Production backend. Tests must never talk to it.
pub const DEFAULT_BASE_URL: &str = "https://api.courier.example";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for courier configuration and data files.
    //!
    //! COURIER_HOME resolution order:
    //! 1. COURIER_HOME environment variable (if set)
    //! 2. ~/.config/courier (default)

    use std::path::PathBuf;

    /// Returns the courier home directory.
    ///
    /// Checks COURIER_HOME env var first, falls back to ~/.config/courier,
    /// then to a relative `.courier` directory when no home can be found.
    pub fn courier_home() -> PathBuf {
        if let Ok(home) = std::env::var("COURIER_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".courier"),
            |h| h.join(".config").join("courier"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        courier_home().join("config.toml")
    }

    /// Returns the path to the persisted session (`auth_prefs` store).
    pub fn session_path() -> PathBuf {
        courier_home().join("auth_prefs.json")
    }

    /// Returns the directory rolling log files are written to.
    pub fn log_dir() -> PathBuf {
        courier_home().join("logs")
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL every API path is joined onto
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Refresh once and retry when a request is rejected with 401
    pub refresh_on_unauthorized: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            refresh_on_unauthorized: false,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Background tracking settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Seconds between tracking polls
    pub poll_interval_secs: u64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
        }
    }
}

impl TrackingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiSettings,
    pub tracking: TrackingSettings,
}

impl Config {
    /// Loads configuration from the default path and applies env overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        if let Some(url) = resolve_base_url(std::env::var(BASE_URL_ENV).ok().as_deref()) {
            config.api.base_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Checks values that would otherwise fail later at request time.
    ///
    /// # Errors
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid api.base_url: {}", self.api.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("api.base_url must be http or https, got {}", url.scheme());
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be > 0");
        }
        if self.tracking.poll_interval_secs == 0 {
            anyhow::bail!("tracking.poll_interval_secs must be > 0");
        }
        Ok(())
    }

    /// Writes the commented default config to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        write_config(path, default_config_template())
    }
}

/// Returns the trimmed override value, ignoring blanks.
fn resolve_base_url(env_value: Option<&str>) -> Option<String> {
    env_value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.trim_end_matches('/').to_string())
}

fn write_config(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
