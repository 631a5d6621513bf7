//! `brewsync install` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::InstallArgs;
use crate::commands::{context, system_managers, ItemsFailed, Project};
use brewsync::core::{Bucket, SkipReason};
use brewsync::core::job::OutcomeStatus;
use brewsync::ops::{install, InstallOptions, InstallSummary, ProgressEvent, ProgressSnapshot};
use brewsync::util::diagnostic::{emit, install_failure_summary};
use brewsync::util::shell::{Shell, Status};
use brewsync::util::CancelToken;

pub fn execute(args: InstallArgs, shell: &Arc<Shell>) -> Result<()> {
    let ctx = context()?;
    let project = Project::load(&ctx, args.file.as_deref())?;

    let options = InstallOptions {
        // Jobs: CLI > config > default
        jobs: args.jobs.unwrap_or_else(|| project.config.jobs()).max(1),
        dry_run: args.dry_run,
        skip_preflight: args.skip_preflight,
        retry: project.config.retry_policy(),
        preflight: project.config.preflight_options(),
    };
    let managers = system_managers(&project.config);

    if !args.skip_preflight && !args.dry_run {
        shell.status(Status::Checking, "network and disk space");
    }

    let progress = shell.progress(project.desired.len(), "Installing");
    let summary = install(
        &managers,
        &project.desired,
        &options,
        &CancelToken::new(),
        &mut |event: &ProgressEvent, snapshot: &ProgressSnapshot| progress.update(event, snapshot),
    );
    progress.finish();
    let summary = summary?;

    report(&summary, shell);

    let failed = summary.count(Bucket::Failed);
    if failed > 0 {
        return Err(ItemsFailed { failed }.into());
    }
    Ok(())
}

fn report(summary: &InstallSummary, shell: &Shell) {
    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "install-finished",
            "summary": summary,
        }));
        return;
    }

    if summary.dry_run {
        for outcome in &summary.outcomes {
            shell.status(Status::DryRun, format!("install {} {}", outcome.category, outcome.name));
        }
        return;
    }

    let already = summary
        .outcomes
        .iter()
        .filter(|o| {
            o.status
                == OutcomeStatus::Skipped {
                    reason: SkipReason::AlreadyInstalled,
                }
        })
        .count();
    if already > 0 && !shell.is_verbose() {
        shell.status(Status::Skipped, format!("{} already installed", already));
    }

    shell.status(
        Status::Finished,
        format!(
            "{} installed, {} skipped, {} failed in {}",
            summary.count(Bucket::Succeeded),
            summary.count(Bucket::Skipped),
            summary.count(Bucket::Failed),
            brewsync::util::shell::format_duration(summary.duration)
        ),
    );

    if let Some(diag) = install_failure_summary(summary) {
        emit(&diag, shell.use_color());
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::InstallArgs;
    use clap::Parser;

    fn parse_install_args(args: &[&str]) -> InstallArgs {
        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            install: InstallArgs,
        }
        TestCli::parse_from(args).install
    }

    #[test]
    fn test_install_args_defaults() {
        let args = parse_install_args(&["test"]);

        assert!(args.file.is_none());
        assert!(!args.dry_run);
        assert!(args.jobs.is_none());
        assert!(!args.skip_preflight);
    }

    #[test]
    fn test_install_args_all_flags() {
        let args = parse_install_args(&[
            "test",
            "--file",
            "machines/work.toml",
            "--dry-run",
            "-j",
            "8",
            "--skip-preflight",
        ]);

        assert_eq!(args.file.unwrap().to_str(), Some("machines/work.toml"));
        assert!(args.dry_run);
        assert_eq!(args.jobs, Some(8));
        assert!(args.skip_preflight);
    }
}
