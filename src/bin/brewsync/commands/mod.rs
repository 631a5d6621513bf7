//! Command implementations

pub mod clean;
pub mod completions;
pub mod diff;
pub mod doctor;
pub mod explain;
pub mod install;
pub mod maintain;
pub mod outdated;
pub mod upgrade;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;

use brewsync::core::{DesiredState, Homebrew, Managers, Npm};
use brewsync::util::config::Config;
use brewsync::util::context::{load_desired, GlobalContext};
use brewsync::util::process::{CommandRunner, SystemRunner};

/// Some items failed; the summary has already been printed.
#[derive(Debug, Error)]
#[error("{failed} item(s) failed")]
pub struct ItemsFailed {
    pub failed: usize,
}

/// A loaded `Brewsync.toml` and the configuration that applies to it.
pub struct Project {
    pub path: PathBuf,
    pub desired: DesiredState,
    pub config: Config,
}

impl Project {
    pub fn load(ctx: &GlobalContext, file: Option<&Path>) -> Result<Self> {
        let path = ctx.desired_file(file)?;
        let desired = load_desired(&path)?;
        let config = ctx.config(Some(path.as_path()));
        tracing::debug!("using {}", path.display());
        Ok(Project {
            path,
            desired,
            config,
        })
    }
}

/// Real package managers configured from `config`.
pub fn system_managers(config: &Config) -> Managers {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    Managers::new(
        Homebrew::new(Arc::clone(&runner)).with_cask_fallback(config.cask_fallback()),
        Npm::new(runner),
    )
}

/// Config for commands that do not read a `Brewsync.toml`.
pub fn ambient_config(ctx: &GlobalContext) -> Config {
    let file = ctx.find_desired_file().ok();
    ctx.config(file.as_deref())
}

pub fn context() -> Result<GlobalContext> {
    GlobalContext::new().context("failed to set up brewsync")
}
