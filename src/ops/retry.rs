//! Bounded retries for transient install failures, and the npm
//! batch-then-fallback strategy built on top of them.

use std::thread;
use std::time::{Duration, Instant};

use crate::core::category::Category;
use crate::core::classify::classify;
use crate::core::job::{JobOutcome, SkipReason};
use crate::core::manager::PackageManager;
use crate::core::npm::Npm;
use crate::ops::progress::{ProgressEvent, ProgressFn, ProgressSnapshot};
use crate::util::cancel::CancelToken;
use crate::util::process::ProcessError;

/// Granularity of a cancellable backoff sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// How many times to try a job and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `n * backoff_unit`.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }

    /// Run `install` until it succeeds, fails for a non-retryable reason,
    /// runs out of attempts, or `cancel` fires.
    pub fn attempt<F>(&self, cancel: &CancelToken, mut install: F) -> JobOutcome
    where
        F: FnMut(&CancelToken) -> JobOutcome,
    {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            let outcome = install(cancel).with_attempts(attempt);

            let error = match outcome.error() {
                Some(error) if error.is_retryable() => error.clone(),
                _ => return outcome.with_duration(started.elapsed()),
            };

            if attempt >= self.max_attempts {
                tracing::debug!(
                    "{} still failing after {} attempts: {}",
                    outcome.name,
                    attempt,
                    error
                );
                let mut exhausted =
                    JobOutcome::retries_exhausted(&outcome.name, outcome.category, error, attempt)
                        .with_duration(started.elapsed());
                exhausted.detail = outcome.detail;
                return exhausted;
            }

            let delay = self.backoff(attempt);
            tracing::info!(
                "{} failed ({}), retrying in {}s",
                outcome.name,
                error,
                delay.as_secs()
            );
            if !sleep_unless_cancelled(delay, cancel) {
                return outcome.with_duration(started.elapsed());
            }
            attempt += 1;
        }
    }
}

/// Sleep for `delay`, waking early on cancellation. Returns `false` if
/// cancelled.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Install npm globals with one batched command, falling back to
/// individual retried installs for whatever the batch left missing.
///
/// Outcomes come back in the order of `names`.
pub fn install_npm_batch(
    npm: &Npm,
    names: &[String],
    policy: &RetryPolicy,
    cancel: &CancelToken,
    on_progress: &mut ProgressFn<'_>,
) -> Vec<JobOutcome> {
    if names.is_empty() {
        return Vec::new();
    }

    let mut snapshot = ProgressSnapshot::new(names.len());

    if cancel.is_cancelled() {
        return skip_all(names, &mut snapshot, on_progress);
    }

    for name in names {
        let event = ProgressEvent::Started {
            name: name.clone(),
            category: Category::Npm,
        };
        snapshot.apply(&event);
        on_progress(&event, &snapshot);
    }

    let started = Instant::now();
    let batch_failure = match npm.install_batch(names, cancel) {
        Ok(out) if out.success => {
            let elapsed = started.elapsed();
            return names
                .iter()
                .map(|n| {
                    let ok =
                        JobOutcome::succeeded(n.as_str(), Category::Npm).with_duration(elapsed);
                    finish(ok, &mut snapshot, on_progress)
                })
                .collect();
        }
        Ok(out) => classify(&out.combined).to_string(),
        Err(ProcessError::Cancelled { .. }) => {
            return skip_all(names, &mut snapshot, on_progress);
        }
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        "batch npm install failed ({}), falling back to individual installs",
        batch_failure
    );

    let present = match npm.list_installed(Category::Npm) {
        Ok(present) => present,
        Err(e) => {
            tracing::warn!("could not re-list npm globals: {}", e);
            Default::default()
        }
    };

    let mut outcomes = Vec::with_capacity(names.len());
    for name in names {
        let outcome = if present.contains(name) {
            tracing::debug!("{} was installed by the batch", name);
            JobOutcome::succeeded(name.as_str(), Category::Npm)
        } else {
            policy.attempt(cancel, |cancel| npm.install_one(name, Category::Npm, cancel))
        };
        outcomes.push(finish(outcome, &mut snapshot, on_progress));
    }
    outcomes
}

fn finish(
    outcome: JobOutcome,
    snapshot: &mut ProgressSnapshot,
    on_progress: &mut ProgressFn<'_>,
) -> JobOutcome {
    let event = ProgressEvent::Finished {
        name: outcome.name.clone(),
        category: outcome.category,
        bucket: outcome.bucket(),
    };
    snapshot.apply(&event);
    on_progress(&event, snapshot);
    outcome
}

fn skip_all(
    names: &[String],
    snapshot: &mut ProgressSnapshot,
    on_progress: &mut ProgressFn<'_>,
) -> Vec<JobOutcome> {
    names
        .iter()
        .map(|n| {
            let skipped = JobOutcome::skipped(n.as_str(), Category::Npm, SkipReason::Cancelled);
            finish(skipped, snapshot, on_progress)
        })
        .collect()
}
