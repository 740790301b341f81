use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{tlog_debug, Error, Result};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_LANGUAGE: &str = "cpython";

/// Client-side settings, read from `~/.taskflow/taskflow.toml`.
///
/// Passwords are never stored here; credentials come from the embedding
/// application at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Execution Service base URL, handed opaquely to the transport.
    pub base_url: Option<String>,
    /// Default login name.
    pub username: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Language used by declared tasks that do not name one.
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Minimum log level (`error`..`trace`).
    pub log_level: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            default_language: default_language(),
            log_level: None,
        }
    }
}

impl Config {
    pub fn taskflow_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskflow"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::taskflow_dir()?.join("taskflow.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let mut config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        if let Some(url) = config.base_url.take() {
            config.base_url = Some(url.trim_end_matches('/').to_string());
        }
        tlog_debug!(
            "Config loaded: base_url={:?}, username={:?}, poll={}ms, wait={}ms",
            config.base_url,
            config.username,
            config.poll_interval_ms,
            config.wait_timeout_ms
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tlog_debug!("Creating config directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        tlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs() -> Result<()> {
        let dir = Self::taskflow_dir()?;
        if !dir.exists() {
            tlog_debug!("Creating taskflow directory: {}", dir.display());
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Expand a leading `~/` against the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
