//! Implementation of `brewsync install`.
//!
//! Installs whatever the desired state names that is not already present:
//! taps first (sequentially, formulae may live in them), then formulae and
//! casks on the worker pool, then npm globals as one batch with per-package
//! retries as the fallback.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::category::{Category, DesiredState, PackageState};
use crate::core::job::{Bucket, InstallJob, JobOutcome, SkipReason};
use crate::core::manager::{ManagerError, Managers, PackageManager};
use crate::ops::converge;
use crate::ops::installer::{ConcurrentInstaller, DEFAULT_POOL_SIZE};
use crate::ops::preflight::{self, PreflightOptions};
use crate::ops::progress::{ProgressEvent, ProgressFn, ProgressSnapshot};
use crate::ops::retry::{install_npm_batch, RetryPolicy};
use crate::util::cancel::CancelToken;

/// Options for the install operation.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub jobs: usize,
    pub dry_run: bool,
    pub skip_preflight: bool,
    pub retry: RetryPolicy,
    pub preflight: PreflightOptions,
}

impl Default for InstallOptions {
    fn default() -> Self {
        InstallOptions {
            jobs: DEFAULT_POOL_SIZE,
            dry_run: false,
            skip_preflight: false,
            retry: RetryPolicy::default(),
            preflight: PreflightOptions::default(),
        }
    }
}

/// Everything an install run did, one outcome per desired package.
#[derive(Debug, Default, Serialize)]
pub struct InstallSummary {
    pub outcomes: Vec<JobOutcome>,
    /// Worker threads used for formulae and casks.
    pub workers: usize,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    pub dry_run: bool,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl InstallSummary {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::is_success)
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.outcomes.iter().filter(|o| o.bucket() == bucket).count()
    }

    /// Failed outcomes grouped by category, in install order.
    pub fn failures_by_category(&self) -> BTreeMap<Category, Vec<&JobOutcome>> {
        let mut grouped: BTreeMap<Category, Vec<&JobOutcome>> = BTreeMap::new();
        for outcome in self.outcomes.iter().filter(|o| o.is_failure()) {
            grouped.entry(outcome.category).or_default().push(outcome);
        }
        grouped
    }
}

/// Install the desired state.
///
/// Fails only when Homebrew is missing, when installed state cannot be
/// listed, or when a preflight check refuses the run. Individual package
/// failures are reported in the summary.
pub fn install(
    managers: &Managers,
    desired: &DesiredState,
    options: &InstallOptions,
    cancel: &CancelToken,
    on_progress: &mut ProgressFn<'_>,
) -> Result<InstallSummary> {
    let started = Instant::now();

    if options.dry_run {
        let outcomes = desired
            .iter()
            .map(|(category, name)| JobOutcome::skipped(name, category, SkipReason::DryRun))
            .collect();
        return Ok(InstallSummary {
            outcomes,
            workers: 0,
            duration: started.elapsed(),
            dry_run: true,
        });
    }

    let needs_brew = [Category::Tap, Category::Formula, Category::Cask]
        .iter()
        .any(|c| !desired.get(*c).is_empty());
    if needs_brew && !managers.brew().is_available() {
        return Err(ManagerError::Unavailable { manager: "brew" }.into());
    }

    let installed = if needs_brew {
        converge::observe(managers, desired)?
    } else {
        PackageState::default().with(
            Category::Npm,
            managers.npm().list_installed(Category::Npm)?,
        )
    };
    let (pending, mut outcomes) = select(desired, &installed);

    if pending.is_empty() {
        tracing::info!("all {} packages already installed", desired.len());
        return Ok(InstallSummary {
            outcomes,
            workers: 0,
            duration: started.elapsed(),
            dry_run: false,
        });
    }

    if !options.skip_preflight {
        preflight::run(&options.preflight, pending.len(), &install_volume(managers))
            .context("preflight check failed")?;
    }

    let mut overall = ProgressSnapshot::new(desired.len());
    overall.completed = outcomes.len();
    overall.skipped = outcomes.len();
    let mut forward = |event: &ProgressEvent, _: &ProgressSnapshot| {
        overall.apply(event);
        on_progress(event, &overall);
    };

    // Taps, one at a time.
    for name in pending.get(Category::Tap) {
        forward(
            &ProgressEvent::Started {
                name: name.clone(),
                category: Category::Tap,
            },
            &ProgressSnapshot::default(),
        );
        let outcome = if cancel.is_cancelled() {
            JobOutcome::skipped(name.as_str(), Category::Tap, SkipReason::Cancelled)
        } else {
            managers.brew().install_one(name, Category::Tap, cancel)
        };
        forward(
            &ProgressEvent::Finished {
                name: name.clone(),
                category: Category::Tap,
                bucket: outcome.bucket(),
            },
            &ProgressSnapshot::default(),
        );
        outcomes.push(outcome);
    }

    // Formulae and casks on the pool.
    let jobs: Vec<InstallJob> = [Category::Formula, Category::Cask]
        .iter()
        .flat_map(|c| pending.get(*c).iter().map(move |n| InstallJob::new(n.as_str(), *c)))
        .collect();
    let brew = managers.brew();
    let report = ConcurrentInstaller::new(options.jobs).run(
        jobs,
        |job, cancel| brew.install_one(job.name(), job.category(), cancel),
        cancel,
        &mut forward,
    );
    outcomes.extend(report.outcomes);

    // npm globals, batched.
    let npm_names: Vec<String> = pending.get(Category::Npm).iter().cloned().collect();
    outcomes.extend(install_npm_batch(
        managers.npm(),
        &npm_names,
        &options.retry,
        cancel,
        &mut forward,
    ));

    Ok(InstallSummary {
        outcomes,
        workers: report.workers,
        duration: started.elapsed(),
        dry_run: false,
    })
}

/// Split desired state into what still needs installing and skip outcomes
/// for what is already there.
fn select(desired: &DesiredState, installed: &PackageState) -> (PackageState, Vec<JobOutcome>) {
    let mut pending = PackageState::default();
    let mut present = Vec::new();

    for (category, name) in desired.iter() {
        if installed.get(category).contains(name) {
            present.push(JobOutcome::skipped(name, category, SkipReason::AlreadyInstalled));
        } else {
            pending.get_mut(category).insert(name.to_string());
        }
    }
    (pending, present)
}

/// A path on the volume Homebrew installs into.
fn install_volume(managers: &Managers) -> PathBuf {
    managers
        .brew()
        .locate()
        .and_then(|brew| brew.ancestors().nth(2).map(PathBuf::from))
        .filter(|prefix| prefix.exists())
        .or_else(|| directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::classify::ErrorKind;
    use crate::core::job::OutcomeStatus;
    use crate::test_support::{npm_listing, state, MachineFixture, MockRunner};
    use crate::util::process::RawOutput;

    fn options() -> InstallOptions {
        InstallOptions {
            skip_preflight: true,
            retry: RetryPolicy::new(3, Duration::ZERO),
            ..Default::default()
        }
    }

    fn run(
        managers: &Managers,
        desired: &DesiredState,
        options: &InstallOptions,
    ) -> InstallSummary {
        install(
            managers,
            desired,
            options,
            &CancelToken::new(),
            &mut |_: &ProgressEvent, _: &ProgressSnapshot| {},
        )
        .unwrap()
    }

    fn outcome<'a>(summary: &'a InstallSummary, name: &str) -> &'a JobOutcome {
        summary.outcomes.iter().find(|o| o.name == name).unwrap()
    }

    #[test]
    fn test_dry_run_makes_no_calls() {
        let runner = Arc::new(MockRunner::new());
        let managers = Managers::with_runner(runner.clone());
        let desired = state(&[
            (Category::Tap, &["hashicorp/tap"]),
            (Category::Formula, &["git"]),
            (Category::Npm, &["typescript"]),
        ]);

        let summary = run(
            &managers,
            &desired,
            &InstallOptions {
                dry_run: true,
                ..options()
            },
        );

        assert_eq!(runner.call_count(), 0);
        assert!(summary.is_success());
        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.count(Bucket::Skipped), 3);
    }

    #[test]
    fn test_installs_only_missing_packages() {
        let runner = MachineFixture::new()
            .with(Category::Formula, &["git"])
            .runner();
        let managers = Managers::with_runner(runner.clone());
        let desired = state(&[
            (Category::Formula, &["git", "wget"]),
            (Category::Cask, &["firefox"]),
        ]);

        let summary = run(&managers, &desired, &options());

        let installs: Vec<String> = runner
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("brew install"))
            .collect();
        assert_eq!(installs.len(), 2);
        assert!(installs.contains(&"brew install wget".to_string()));
        assert!(installs.contains(&"brew install --cask firefox".to_string()));
        assert_eq!(
            outcome(&summary, "git").status,
            OutcomeStatus::Skipped {
                reason: SkipReason::AlreadyInstalled
            }
        );
        assert_eq!(summary.count(Bucket::Succeeded), 2);
        assert!(summary.is_success());
    }

    #[test]
    fn test_taps_install_before_formulae() {
        let runner = MachineFixture::new().runner();
        let managers = Managers::with_runner(runner.clone());
        let desired = state(&[
            (Category::Tap, &["hashicorp/tap"]),
            (Category::Formula, &["hashicorp/tap/terraform"]),
        ]);

        run(&managers, &desired, &options());

        let calls = runner.calls();
        let tap = calls.iter().position(|c| c == "brew tap hashicorp/tap").unwrap();
        let formula = calls
            .iter()
            .position(|c| c == "brew install hashicorp/tap/terraform")
            .unwrap();
        assert!(tap < formula);
    }

    #[test]
    fn test_failures_grouped_by_category() {
        let runner = MachineFixture::new().runner();
        runner.expect(
            "brew install nosuchthing",
            RawOutput::failure("Error: No available formula with the name \"nosuchthing\""),
        );
        runner.expect(
            "npm install -g left-pad nope",
            RawOutput::failure("npm ERR! 404 Not Found"),
        );
        runner.expect(
            "npm install -g nope",
            RawOutput::failure("npm ERR! 404 Not Found - GET https://registry.npmjs.org/nope"),
        );
        let managers = Managers::with_runner(runner.clone());
        let desired = state(&[
            (Category::Formula, &["git", "nosuchthing"]),
            (Category::Npm, &["left-pad", "nope"]),
        ]);

        let summary = run(&managers, &desired, &options());

        assert!(!summary.is_success());
        let grouped = summary.failures_by_category();
        assert_eq!(grouped[&Category::Formula].len(), 1);
        assert_eq!(grouped[&Category::Npm][0].name, "nope");
        assert_eq!(grouped[&Category::Npm][0].error(), Some(&ErrorKind::NotFound));
        assert_eq!(outcome(&summary, "left-pad").status, OutcomeStatus::Succeeded);
    }

    #[test]
    fn test_npm_only_without_brew() {
        let runner = Arc::new(MockRunner::new().without_program("brew"));
        runner.expect(
            "npm list -g --depth=0 --parseable",
            RawOutput::success(npm_listing(&[])),
        );
        runner.expect("npm install -g typescript", RawOutput::success(""));
        let managers = Managers::with_runner(runner.clone());

        let summary = run(&managers, &state(&[(Category::Npm, &["typescript"])]), &options());

        assert!(summary.is_success());
        assert_eq!(
            runner.calls(),
            vec![
                "npm list -g --depth=0 --parseable",
                "npm install -g typescript"
            ]
        );
    }

    #[test]
    fn test_missing_brew_is_an_error() {
        let runner = Arc::new(MockRunner::new().without_program("brew"));
        let managers = Managers::with_runner(runner.clone());

        let result = install(
            &managers,
            &state(&[(Category::Formula, &["git"])]),
            &options(),
            &CancelToken::new(),
            &mut |_: &ProgressEvent, _: &ProgressSnapshot| {},
        );

        assert!(result.is_err());
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_progress_reaches_total() {
        let runner = MachineFixture::new()
            .with(Category::Npm, &["typescript"])
            .runner();
        let managers = Managers::with_runner(runner);
        let desired = state(&[
            (Category::Formula, &["git", "jq"]),
            (Category::Npm, &["typescript", "pnpm"]),
        ]);
        let mut last = ProgressSnapshot::default();

        install(
            &managers,
            &desired,
            &options(),
            &CancelToken::new(),
            &mut |_: &ProgressEvent, snapshot: &ProgressSnapshot| last = snapshot.clone(),
        )
        .unwrap();

        assert_eq!(last.total, 4);
        assert_eq!(last.completed, 4);
        assert_eq!(last.skipped, 1);
        assert_eq!(last.succeeded, 3);
    }

    #[test]
    fn test_cancelled_install_still_finishes_progress() {
        let runner = MachineFixture::new().runner();
        let managers = Managers::with_runner(runner.clone());
        let desired = state(&[
            (Category::Tap, &["hashicorp/tap"]),
            (Category::Formula, &["git"]),
            (Category::Npm, &["typescript"]),
        ]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut last = ProgressSnapshot::default();

        let summary = install(
            &managers,
            &desired,
            &options(),
            &cancel,
            &mut |_: &ProgressEvent, snapshot: &ProgressSnapshot| last = snapshot.clone(),
        )
        .unwrap();

        assert_eq!(last.total, 3);
        assert_eq!(last.completed, 3);
        assert_eq!(last.skipped, 3);
        assert!(summary.outcomes.iter().all(|o| o.status
            == OutcomeStatus::Skipped {
                reason: SkipReason::Cancelled
            }));
        assert!(!runner.calls().iter().any(|c| c.contains("install")));
    }
}
