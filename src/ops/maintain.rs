//! Whole-installation Homebrew maintenance: `outdated`, `upgrade`, `maintain`.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::classify::{classify, ErrorKind};
use crate::core::homebrew::{MaintenanceCommand, OutdatedPackage};
use crate::core::manager::Managers;
use crate::util::cancel::CancelToken;

/// How one maintenance command went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StepStatus {
    Succeeded,
    Failed { error: ErrorKind },
    Cancelled,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceStep {
    pub command: &'static str,
    #[serde(flatten)]
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub steps: Vec<MaintenanceStep>,
}

impl MaintenanceReport {
    pub fn is_success(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Failed { .. }))
    }
}

/// Packages with a newer version available.
pub fn outdated(managers: &Managers) -> Result<Vec<OutdatedPackage>> {
    managers
        .brew()
        .outdated()
        .context("failed to list outdated packages")
}

/// `brew update` followed by `brew upgrade`.
///
/// The upgrade still runs when the update fails; stale metadata only
/// means fewer upgrades.
pub fn upgrade(
    managers: &Managers,
    dry_run: bool,
    cancel: &CancelToken,
) -> Result<MaintenanceReport> {
    run_steps(
        managers,
        &[MaintenanceCommand::Update, MaintenanceCommand::Upgrade],
        dry_run,
        cancel,
    )
}

/// `brew cleanup`.
pub fn cleanup(
    managers: &Managers,
    dry_run: bool,
    cancel: &CancelToken,
) -> Result<MaintenanceReport> {
    run_steps(managers, &[MaintenanceCommand::Cleanup], dry_run, cancel)
}

fn run_steps(
    managers: &Managers,
    commands: &[MaintenanceCommand],
    dry_run: bool,
    cancel: &CancelToken,
) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();

    for command in commands {
        let status = if dry_run {
            StepStatus::DryRun
        } else if cancel.is_cancelled() {
            StepStatus::Cancelled
        } else {
            let out = managers
                .brew()
                .maintenance(*command, cancel)
                .with_context(|| format!("failed to run `brew {}`", command.as_str()))?;
            if out.success {
                StepStatus::Succeeded
            } else {
                tracing::debug!("brew {} failed:\n{}", command.as_str(), out.combined);
                StepStatus::Failed {
                    error: classify(&out.combined),
                }
            }
        };

        report.steps.push(MaintenanceStep {
            command: command.as_str(),
            status,
        });
    }

    Ok(report)
}
