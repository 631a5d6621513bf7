//! `brewsync clean` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::CleanArgs;
use crate::commands::{context, system_managers, ItemsFailed, Project};
use brewsync::core::{Bucket, Category, JobOutcome};
use brewsync::ops::{execute_with, plan};
use brewsync::util::diagnostic::{emit, removal_failure_summary};
use brewsync::util::shell::{Shell, Status};
use brewsync::util::CancelToken;

pub fn execute(args: CleanArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = context()?;
    let project = Project::load(&ctx, args.file.as_deref())?;
    let managers = system_managers(&project.config);

    let plan = plan(&managers, &project.desired)?;
    if plan.is_empty() {
        shell.note("nothing to remove");
        return Ok(());
    }

    if args.dry_run {
        for category in Category::REMOVAL_ORDER {
            for name in plan.extra.get(category) {
                shell.status(Status::DryRun, format!("remove {} {}", category, name));
            }
        }
        shell.json_event(&serde_json::json!({
            "reason": "clean-finished",
            "dry_run": true,
            "plan": plan.extra,
        }));
        return Ok(());
    }

    let span = shell.span(Status::Removing, format!("{} package(s)", plan.len()));
    let mut on_item = |outcome: &JobOutcome| {
        let status = match outcome.bucket() {
            Bucket::Succeeded => Status::Removed,
            Bucket::Skipped => Status::Skipped,
            Bucket::Failed => Status::Failed,
        };
        shell.status(status, format!("{} {}", outcome.category, outcome.name));
    };
    let result = execute_with(&plan, &managers, false, &CancelToken::new(), &mut on_item);
    span.finish_with_message(format!("removed {} package(s)", result.removed.len()));

    shell.json_event(&serde_json::json!({
        "reason": "clean-finished",
        "dry_run": false,
        "result": result,
    }));

    if let Some(diag) = removal_failure_summary(&result) {
        if !shell.is_json() {
            emit(&diag, shell.use_color());
        }
        let failed = result.error.map(|e| e.failures.len()).unwrap_or_default();
        return Err(ItemsFailed { failed }.into());
    }
    Ok(())
}
