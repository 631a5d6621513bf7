//! Configuration file support for brewsync.
//!
//! brewsync reads tool settings from two locations:
//! - Global: `~/.brewsync/config.toml` - User-wide defaults
//! - Project: `.brewsync/config.toml` - Overrides next to a `Brewsync.toml`
//!
//! Project config takes precedence over global config. Every setting is
//! optional; unset values fall back to built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::homebrew::CaskFallback;
use crate::ops::installer::DEFAULT_POOL_SIZE;
use crate::ops::preflight::PreflightOptions;
use crate::ops::retry::RetryPolicy;

/// brewsync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Install settings
    pub install: InstallConfig,

    /// Retry settings for npm installs
    pub retry: RetryConfig,

    /// Checks run before installing anything
    pub preflight: PreflightConfig,
}

/// Install-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Concurrent installs (None = built-in default)
    pub jobs: Option<usize>,

    /// Retry failed formula installs as casks
    pub cask_fallback: Option<CaskFallback>,
}

/// Retry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,

    /// Backoff unit in seconds; the wait grows linearly per attempt
    pub backoff_secs: Option<u64>,
}

/// Preflight configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// `host:port` pairs that must accept a TCP connection
    pub hosts: Option<Vec<String>>,

    /// Connect timeout per host, in seconds
    pub timeout_secs: Option<u64>,

    /// Estimated disk use per package, in GB
    pub gb_per_package: Option<f64>,

    /// Minimum free space regardless of package count, in GB
    pub min_free_gb: Option<f64>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.install.jobs.is_some() {
            self.install.jobs = other.install.jobs;
        }
        if other.install.cask_fallback.is_some() {
            self.install.cask_fallback = other.install.cask_fallback;
        }

        if other.retry.max_attempts.is_some() {
            self.retry.max_attempts = other.retry.max_attempts;
        }
        if other.retry.backoff_secs.is_some() {
            self.retry.backoff_secs = other.retry.backoff_secs;
        }

        if other.preflight.hosts.is_some() {
            self.preflight.hosts = other.preflight.hosts;
        }
        if other.preflight.timeout_secs.is_some() {
            self.preflight.timeout_secs = other.preflight.timeout_secs;
        }
        if other.preflight.gb_per_package.is_some() {
            self.preflight.gb_per_package = other.preflight.gb_per_package;
        }
        if other.preflight.min_free_gb.is_some() {
            self.preflight.min_free_gb = other.preflight.min_free_gb;
        }
    }

    /// Worker pool size.
    pub fn jobs(&self) -> usize {
        self.install.jobs.unwrap_or(DEFAULT_POOL_SIZE).max(1)
    }

    pub fn cask_fallback(&self) -> CaskFallback {
        self.install.cask_fallback.unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy::new(
            self.retry.max_attempts.unwrap_or(default.max_attempts),
            self.retry
                .backoff_secs
                .map(Duration::from_secs)
                .unwrap_or(default.backoff_unit),
        )
    }

    pub fn preflight_options(&self) -> PreflightOptions {
        let mut options = PreflightOptions::default();
        if let Some(hosts) = &self.preflight.hosts {
            options.hosts = hosts.clone();
        }
        if let Some(secs) = self.preflight.timeout_secs {
            options.timeout = Duration::from_secs(secs);
        }
        if let Some(gb) = self.preflight.gb_per_package {
            options.gb_per_package = gb;
        }
        if let Some(gb) = self.preflight.min_free_gb {
            options.min_free_gb = gb;
        }
        options
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.brewsync/config.toml)
/// 2. Global config (~/.brewsync/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global brewsync config directory (~/.brewsync).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".brewsync"))
}
