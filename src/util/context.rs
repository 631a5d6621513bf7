//! Global context for brewsync operations.
//!
//! Provides centralized access to paths, the desired-state file and the
//! merged tool configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::category::DesiredState;
use crate::util::config::{global_config_dir, load_config, Config};

/// File name of the desired-state declaration.
pub const DESIRED_FILE: &str = "Brewsync.toml";

/// Directory next to `Brewsync.toml` holding project-local settings.
pub const PROJECT_DIR: &str = ".brewsync";

#[derive(Debug, Error)]
pub enum DesiredFileError {
    #[error("could not find `{DESIRED_FILE}` in {dir} or any parent directory")]
    NotFound { dir: PathBuf },
}

/// Global context containing paths and configuration.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global brewsync data (~/.brewsync/)
    home: PathBuf,
}

impl GlobalContext {
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a context rooted at a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(PROJECT_DIR));
        GlobalContext { cwd, home }
    }

    /// Override the home directory.
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The brewsync home directory (~/.brewsync/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Project configuration file path for a desired-state file.
    pub fn project_config_path(&self, desired_file: &Path) -> PathBuf {
        desired_file
            .parent()
            .unwrap_or(&self.cwd)
            .join(PROJECT_DIR)
            .join("config.toml")
    }

    /// Find `Brewsync.toml` starting from cwd and searching upward.
    pub fn find_desired_file(&self) -> Result<PathBuf, DesiredFileError> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(DESIRED_FILE);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                return Err(DesiredFileError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }

    /// Resolve an explicit `--file` against cwd, or search for one.
    pub fn desired_file(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) if path.is_absolute() => Ok(path.to_path_buf()),
            Some(path) => Ok(self.cwd.join(path)),
            None => Ok(self.find_desired_file()?),
        }
    }

    /// Merged global and project configuration.
    pub fn config(&self, desired_file: Option<&Path>) -> Config {
        let project = match desired_file {
            Some(file) => self.project_config_path(file),
            None => self.cwd.join(PROJECT_DIR).join("config.toml"),
        };
        load_config(&self.config_path(), &project)
    }
}

/// Parse a desired-state file.
///
/// Unknown keys are rejected so a typo like `formula = [...]` is not
/// silently ignored.
pub fn load_desired(path: &Path) -> Result<DesiredState> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_desired(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_desired(contents: &str) -> Result<DesiredState> {
    let desired: DesiredState = toml::from_str(contents)?;
    tracing::debug!(
        "desired state: {} taps, {} formulae, {} casks, {} npm globals",
        desired.taps.len(),
        desired.formulae.len(),
        desired.casks.len(),
        desired.npm.len()
    );
    Ok(desired)
}
