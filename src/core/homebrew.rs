//! Homebrew adapter: formulae, casks and taps.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::category::Category;
use crate::core::classify::{classify, ErrorKind};
use crate::core::job::{JobOutcome, OutcomeStatus};
use crate::core::manager::{outcome_from, parse_lines, ManagerError, PackageManager};
use crate::util::cancel::CancelToken;
use crate::util::process::{CommandRunner, ProcessError, RawOutput};

const BREW: &str = "brew";

/// Taps Homebrew manages itself; never reported, so never untapped.
const BUILTIN_TAPS: &[&str] = &[
    "homebrew/core",
    "homebrew/cask",
    "homebrew/bundle",
    "homebrew/services",
    "homebrew/command-not-found",
];

/// Output fragments that mean "this name is a cask, not a formula".
const CASK_HINTS: &[&str] = &["found a cask named", "is a cask", "--cask"];

/// What to do when a formula install fails because the name is a cask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaskFallback {
    /// Retry once as `install --cask`.
    #[default]
    FormulaToCask,
    /// Surface the formula failure as-is.
    Disabled,
}

/// Homebrew driven through a [`CommandRunner`].
pub struct Homebrew {
    runner: Arc<dyn CommandRunner>,
    cask_fallback: CaskFallback,
}

impl Homebrew {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Homebrew {
            runner,
            cask_fallback: CaskFallback::default(),
        }
    }

    pub fn with_cask_fallback(mut self, policy: CaskFallback) -> Self {
        self.cask_fallback = policy;
        self
    }

    /// Path to the `brew` binary, if any.
    pub fn locate(&self) -> Option<PathBuf> {
        self.runner.locate(BREW)
    }

    fn run(&self, args: &[&str], cancel: &CancelToken) -> Result<RawOutput, ProcessError> {
        self.runner.run(BREW, args, cancel)
    }

    /// Run a query command and require success.
    fn query(&self, args: &[&str]) -> Result<String, ManagerError> {
        if !self.is_available() {
            return Err(ManagerError::Unavailable { manager: BREW });
        }
        let out = self.run(args, &CancelToken::new())?;
        if out.success {
            Ok(out.combined)
        } else {
            Err(ManagerError::CommandFailed {
                command: format!("{} {}", BREW, args.join(" ")),
                reason: classify(&out.combined),
            })
        }
    }

    /// `brew outdated --json`.
    pub fn outdated(&self) -> Result<Vec<OutdatedPackage>, ManagerError> {
        let json = self.query(&["outdated", "--json"])?;
        parse_outdated(&json).map_err(|e| ManagerError::CommandFailed {
            command: "brew outdated --json".to_string(),
            reason: ErrorKind::Reported(format!("unreadable JSON: {}", e)),
        })
    }

    /// Run a whole-installation maintenance command such as `update`,
    /// `upgrade`, `cleanup` or `doctor`.
    pub fn maintenance(
        &self,
        command: MaintenanceCommand,
        cancel: &CancelToken,
    ) -> Result<RawOutput, ManagerError> {
        if !self.is_available() {
            return Err(ManagerError::Unavailable { manager: BREW });
        }
        tracing::info!("running brew {}", command.as_str());
        Ok(self.run(&[command.as_str()], cancel)?)
    }

    fn install_args(name: &str, category: Category) -> Vec<&str> {
        match category {
            Category::Tap => vec!["tap", name],
            Category::Cask => vec!["install", "--cask", name],
            _ => vec!["install", name],
        }
    }

    fn uninstall_args(name: &str, category: Category) -> Vec<&str> {
        match category {
            Category::Tap => vec!["untap", name],
            Category::Cask => vec!["uninstall", "--cask", name],
            _ => vec!["uninstall", name],
        }
    }
}

/// Whether formula-install output says the package is really a cask.
pub fn suggests_cask(output: &str) -> bool {
    let lower = output.to_lowercase();
    CASK_HINTS.iter().any(|hint| lower.contains(hint))
}

impl PackageManager for Homebrew {
    fn name(&self) -> &'static str {
        BREW
    }

    fn categories(&self) -> &'static [Category] {
        &[Category::Tap, Category::Formula, Category::Cask]
    }

    fn is_available(&self) -> bool {
        self.locate().is_some()
    }

    fn list_installed(&self, category: Category) -> Result<BTreeSet<String>, ManagerError> {
        let args: &[&str] = match category {
            Category::Formula => &["list", "--formula", "-1"],
            Category::Cask => &["list", "--cask", "-1"],
            Category::Tap => &["tap"],
            Category::Npm => {
                return Err(ManagerError::UnsupportedCategory {
                    manager: BREW,
                    category,
                })
            }
        };
        let output = self.query(args)?;
        let mut names = parse_lines(&output);
        if category == Category::Tap {
            names.retain(|tap| !BUILTIN_TAPS.contains(&tap.as_str()));
        }
        Ok(names)
    }

    fn install_one(&self, name: &str, category: Category, cancel: &CancelToken) -> JobOutcome {
        let started = Instant::now();
        let result = self.run(&Self::install_args(name, category), cancel);

        let fallback_applies = category == Category::Formula
            && self.cask_fallback == CaskFallback::FormulaToCask
            && matches!(&result, Ok(out) if !out.success && suggests_cask(&out.combined));

        let outcome = outcome_from(name, category, result, started);
        if !fallback_applies {
            return outcome;
        }

        tracing::info!("{} looks like a cask, retrying with --cask", name);
        let retried = outcome_from(
            name,
            Category::Cask,
            self.run(&Self::install_args(name, Category::Cask), cancel),
            started,
        );
        match retried.status {
            OutcomeStatus::Succeeded | OutcomeStatus::Skipped { .. } => retried.with_attempts(2),
            // The cask attempt failed too: the formula failure is the one to report.
            _ => outcome.with_attempts(2).with_duration(started.elapsed()),
        }
    }

    fn uninstall_one(&self, name: &str, category: Category, cancel: &CancelToken) -> JobOutcome {
        let started = Instant::now();
        let result = self.run(&Self::uninstall_args(name, category), cancel);
        outcome_from(name, category, result, started)
    }
}

/// Whole-installation Homebrew commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceCommand {
    Update,
    Upgrade,
    Cleanup,
    Doctor,
}

impl MaintenanceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceCommand::Update => "update",
            MaintenanceCommand::Upgrade => "upgrade",
            MaintenanceCommand::Cleanup => "cleanup",
            MaintenanceCommand::Doctor => "doctor",
        }
    }
}

/// One entry of `brew outdated --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedPackage {
    pub name: String,
    #[serde(default)]
    pub installed_versions: Vec<String>,
    pub current_version: String,
    #[serde(skip_deserializing, default = "default_category")]
    pub category: Category,
}

fn default_category() -> Category {
    Category::Formula
}

#[derive(Debug, Deserialize)]
struct OutdatedReport {
    #[serde(default)]
    formulae: Vec<OutdatedPackage>,
    #[serde(default)]
    casks: Vec<OutdatedPackage>,
}

/// Parse the JSON printed by `brew outdated --json`.
pub fn parse_outdated(json: &str) -> Result<Vec<OutdatedPackage>, serde_json::Error> {
    let report: OutdatedReport = serde_json::from_str(json)?;

    let formulae = report.formulae.into_iter().map(|mut p| {
        p.category = Category::Formula;
        p
    });
    let casks = report.casks.into_iter().map(|mut p| {
        p.category = Category::Cask;
        p
    });

    Ok(formulae.chain(casks).collect())
}
