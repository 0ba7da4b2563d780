//! Configuration for the updater.
//!
//! Every setting has a default, so the file is optional. The configuration is
//! read from, in order of precedence:
//!
//! 1. The file named by `STAGEHAND_CONFIG`
//! 2. `<vendor-dir>/stagehand.toml`
//! 3. Built-in defaults
//!
//! Individual environment overrides are applied on top:
//! `STAGEHAND_DISABLE_TIMEOUT_MS` and `STAGEHAND_LOG_LEVEL`.
//!
//! # TOML Example
//!
//! ```toml
//! disable_timeout_ms = 2000
//! handle_release_delay_ms = 50
//! recreate_delay_ms = 10
//! updater_exe_name = "stagehand.exe"
//!
//! [log]
//! file_name = "widget-update.log"
//! max_bytes = 1048576
//! level = "debug"
//! ```

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_DISABLE_TIMEOUT, DEFAULT_HANDLE_RELEASE_DELAY,
    DEFAULT_LOG_FILE_NAME, DEFAULT_LOG_MAX_BYTES, DEFAULT_RECREATE_DELAY,
};
use crate::core::UpdateError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "STAGEHAND_CONFIG";

/// Environment override for [`UpdaterConfig::disable_timeout_ms`].
pub const DISABLE_TIMEOUT_ENV: &str = "STAGEHAND_DISABLE_TIMEOUT_MS";

/// Environment override for [`LogConfig::level`].
pub const LOG_LEVEL_ENV: &str = "STAGEHAND_LOG_LEVEL";

/// Updater settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdaterConfig {
    /// How long to keep retrying the rename of the live executable.
    ///
    /// # Default: `1000`
    #[serde(default = "default_disable_timeout_ms")]
    pub disable_timeout_ms: u64,

    /// Pause after disabling the executable, before promotion starts.
    ///
    /// # Default: `50`
    #[serde(default = "default_handle_release_delay_ms")]
    pub handle_release_delay_ms: u64,

    /// Pause between removing and recreating the staging directories.
    ///
    /// # Default: `10`
    #[serde(default = "default_recreate_delay_ms")]
    pub recreate_delay_ms: u64,

    /// File name of the updater binary copied into the working copy.
    ///
    /// When unset, the running executable's own file name is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updater_exe_name: Option<String>,

    /// Directory for instance lock files. Defaults to the OS temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,

    /// Log file settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Log file settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Log file name inside the vendor directory.
    #[serde(default = "default_log_file_name")]
    pub file_name: String,

    /// Size above which the log is truncated when it is next opened.
    #[serde(default = "default_log_max_bytes")]
    pub max_bytes: u64,

    /// Minimum level written to the log file (`error` .. `trace`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            disable_timeout_ms: default_disable_timeout_ms(),
            handle_release_delay_ms: default_handle_release_delay_ms(),
            recreate_delay_ms: default_recreate_delay_ms(),
            updater_exe_name: None,
            lock_dir: None,
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_name: default_log_file_name(),
            max_bytes: default_log_max_bytes(),
            level: default_log_level(),
        }
    }
}

fn default_disable_timeout_ms() -> u64 {
    DEFAULT_DISABLE_TIMEOUT.as_millis() as u64
}

fn default_handle_release_delay_ms() -> u64 {
    DEFAULT_HANDLE_RELEASE_DELAY.as_millis() as u64
}

fn default_recreate_delay_ms() -> u64 {
    DEFAULT_RECREATE_DELAY.as_millis() as u64
}

fn default_log_file_name() -> String {
    DEFAULT_LOG_FILE_NAME.to_string()
}

const fn default_log_max_bytes() -> u64 {
    DEFAULT_LOG_MAX_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl UpdaterConfig {
    /// Load the configuration for an application whose vendor directory is `vendor_dir`.
    pub fn load(vendor_dir: &Path) -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(|| vendor_dir.join(CONFIG_FILE_NAME));

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else if let Some(explicit) = explicit {
            return Err(UpdateError::Config {
                message: format!(
                    "{CONFIG_PATH_ENV} points to a missing file: {}",
                    explicit.display()
                ),
            }
            .into());
        } else {
            debug!("No configuration file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            UpdateError::Config {
                message: e.to_string(),
            }
            .into()
        })
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(DISABLE_TIMEOUT_ENV) {
            self.disable_timeout_ms = value.trim().parse().map_err(|_| UpdateError::Config {
                message: format!(
                    "{DISABLE_TIMEOUT_ENV} must be a number of milliseconds, got '{value}'"
                ),
            })?;
        }
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            self.log.level = level;
        }
        Ok(())
    }

    /// Rename retry window for the Disabling step.
    pub const fn disable_timeout(&self) -> Duration {
        Duration::from_millis(self.disable_timeout_ms)
    }

    /// Settle delay after a successful disable.
    pub const fn handle_release_delay(&self) -> Duration {
        Duration::from_millis(self.handle_release_delay_ms)
    }

    /// Delay between deleting and recreating the staging directories.
    pub const fn recreate_delay(&self) -> Duration {
        Duration::from_millis(self.recreate_delay_ms)
    }

    /// Directory for instance lock files.
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(crate::guard::default_lock_dir)
    }

    /// Name of the updater binary, falling back to `current_exe`'s file name.
    pub fn updater_exe_name(&self, current_exe: &Path) -> Option<String> {
        self.updater_exe_name.clone().or_else(|| {
            current_exe.file_name().and_then(|name| name.to_str()).map(str::to_string)
        })
    }
}
