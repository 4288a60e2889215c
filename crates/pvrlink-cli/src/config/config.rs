//! `AppConfig` struct and TOML read/write.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `account.password`.
pub const PASSWORD_ENV: &str = "PVRLINK_PASSWORD";

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Backend account.
    #[serde(default)]
    pub account: AccountConfig,
    /// Channel listing settings.
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// Replay settings.
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Update scheduler tuning.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Account credentials.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AccountConfig {
    /// Login name (e-mail address).
    #[serde(default)]
    pub username: String,
    /// Password. Prefer the `PVRLINK_PASSWORD` environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Channel listing configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChannelsConfig {
    /// List only the user's favorite channels.
    #[serde(default)]
    pub favorites_only: bool,
}

/// Replay configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Days a finished broadcast stays replayable.
    #[serde(default = "default_catchup_days")]
    pub catchup_days: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            catchup_days: default_catchup_days(),
        }
    }
}

/// Update scheduler configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of update workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Seconds between periodic timer/recording refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

const fn default_catchup_days() -> u32 {
    7
}

const fn default_workers() -> usize {
    pvrlink_api::scheduler::DEFAULT_WORKERS
}

const fn default_refresh_interval_secs() -> u32 {
    600
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Password from `PVRLINK_PASSWORD`, falling back to the config file.
    #[must_use]
    pub fn password(&self) -> Option<String> {
        self.password_with_override(std::env::var(PASSWORD_ENV).ok())
    }

    fn password_with_override(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .filter(|p| !p.is_empty())
            .or_else(|| self.account.password.clone())
    }
}
