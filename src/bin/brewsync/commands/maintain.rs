//! `brewsync maintain` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::MaintainArgs;
use crate::commands::{ambient_config, context, system_managers, ItemsFailed};
use brewsync::ops::{cleanup, MaintenanceReport, StepStatus};
use brewsync::util::diagnostic::{emit, suggestion_for, suggestions, Diagnostic};
use brewsync::util::shell::{Shell, Status};
use brewsync::util::CancelToken;

pub fn execute(args: MaintainArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = context()?;
    let managers = system_managers(&ambient_config(&ctx));

    let result = cleanup(&managers, args.dry_run, &CancelToken::new())?;
    report(&result, shell)
}

/// Print one line per step; fail when any step failed.
pub fn report(result: &MaintenanceReport, shell: &Shell) -> Result<()> {
    shell.json_event(&serde_json::json!({
        "reason": "maintenance-finished",
        "report": result,
    }));

    let mut failed = Vec::new();
    for step in &result.steps {
        let label = format!("brew {}", step.command);
        match &step.status {
            StepStatus::Succeeded => shell.status(Status::Finished, label),
            StepStatus::DryRun => shell.status(Status::DryRun, label),
            StepStatus::Cancelled => shell.status(Status::Skipped, label),
            StepStatus::Failed { error } => {
                shell.status(Status::Failed, format!("brew {}: {}", step.command, error));
                failed.push((step.command, error));
            }
        }
    }

    if failed.is_empty() {
        return Ok(());
    }

    if !shell.is_json() {
        let mut diag = Diagnostic::error(format!(
            "{} of {} maintenance steps failed",
            failed.len(),
            result.steps.len()
        ));
        for (command, error) in &failed {
            diag = diag.with_context(format!("brew {}: {}", command, error));
            if let Some(suggestion) = suggestion_for(error) {
                diag = diag.with_suggestion(suggestion);
            }
        }
        emit(&diag.with_suggestion(suggestions::VERBOSE), shell.use_color());
    }
    Err(ItemsFailed {
        failed: failed.len(),
    }
    .into())
}
