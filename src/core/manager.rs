//! The package-manager adapter interface.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::core::category::Category;
use crate::core::classify::{classify, ErrorKind};
use crate::core::homebrew::Homebrew;
use crate::core::job::{JobOutcome, SkipReason};
use crate::core::npm::Npm;
use crate::util::cancel::CancelToken;
use crate::util::process::{CommandRunner, ProcessError, RawOutput, SystemRunner};

/// Error from a package-manager query.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("`{manager}` is not installed or not on PATH")]
    Unavailable { manager: &'static str },

    #[error("`{manager}` does not manage {category} packages")]
    UnsupportedCategory {
        manager: &'static str,
        category: Category,
    },

    #[error("`{command}` failed: {reason}")]
    CommandFailed { command: String, reason: ErrorKind },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// One external package manager.
pub trait PackageManager: Send + Sync {
    /// Binary name, e.g. `brew`.
    fn name(&self) -> &'static str;

    /// Categories this manager owns.
    fn categories(&self) -> &'static [Category];

    /// Whether the binary can be found.
    fn is_available(&self) -> bool;

    /// Names currently installed in `category`.
    ///
    /// Optional managers report an empty set when their binary is missing.
    fn list_installed(&self, category: Category) -> Result<BTreeSet<String>, ManagerError>;

    /// Install one package. Never fails: problems are reported in the outcome.
    fn install_one(&self, name: &str, category: Category, cancel: &CancelToken) -> JobOutcome;

    /// Remove one package. Never fails: problems are reported in the outcome.
    fn uninstall_one(&self, name: &str, category: Category, cancel: &CancelToken) -> JobOutcome;
}

/// Turn a finished command into a job outcome.
///
/// `AlreadyInstalled` output counts as a skip rather than a failure.
pub(crate) fn outcome_from(
    name: &str,
    category: Category,
    result: Result<RawOutput, ProcessError>,
    started: Instant,
) -> JobOutcome {
    let outcome = match result {
        Ok(out) if out.success => JobOutcome::succeeded(name, category),
        Ok(out) => match classify(&out.combined) {
            ErrorKind::AlreadyInstalled => {
                JobOutcome::skipped(name, category, SkipReason::AlreadyInstalled)
            }
            kind => {
                tracing::debug!("{} {} failed ({}):\n{}", category, name, kind, out.combined);
                JobOutcome::failed(name, category, kind).with_detail(out.combined)
            }
        },
        Err(ProcessError::Cancelled { .. }) => {
            JobOutcome::skipped(name, category, SkipReason::Cancelled)
        }
        Err(e) => {
            tracing::debug!("{} {} could not run: {}", category, name, e);
            JobOutcome::failed(name, category, ErrorKind::ManagerUnavailable)
                .with_detail(e.to_string())
        }
    };
    outcome.with_duration(started.elapsed())
}

/// Split listing output into trimmed, non-empty lines.
pub(crate) fn parse_lines(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// The pair of managers this tool drives, dispatched by category.
#[derive(Clone)]
pub struct Managers {
    brew: Arc<Homebrew>,
    npm: Arc<Npm>,
}

impl Managers {
    pub fn new(brew: Homebrew, npm: Npm) -> Self {
        Managers {
            brew: Arc::new(brew),
            npm: Arc::new(npm),
        }
    }

    /// Managers backed by real subprocesses.
    pub fn system() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    /// Managers sharing one command runner.
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(Homebrew::new(Arc::clone(&runner)), Npm::new(runner))
    }

    pub fn brew(&self) -> &Homebrew {
        &self.brew
    }

    pub fn npm(&self) -> &Npm {
        &self.npm
    }

    /// The manager that owns `category`.
    pub fn for_category(&self, category: Category) -> &dyn PackageManager {
        match category {
            Category::Npm => self.npm.as_ref(),
            Category::Tap | Category::Formula | Category::Cask => self.brew.as_ref(),
        }
    }
}
