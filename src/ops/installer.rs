//! Bounded-concurrency install execution.
//!
//! Jobs are pushed onto a crossbeam queue and pulled by `W = min(pool, jobs)`
//! workers on a dedicated rayon pool. Workers report progress on a second
//! channel which the calling thread drains, so the only shared mutable
//! state is owned by a single consumer.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::job::{InstallJob, JobOutcome, SkipReason};
use crate::ops::progress::{ProgressEvent, ProgressFn, ProgressSnapshot};
use crate::util::cancel::CancelToken;

/// Default number of concurrent installs.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Outcomes of an installer run, one per job, in job order.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub outcomes: Vec<JobOutcome>,
    /// Worker threads actually started.
    pub workers: usize,
}

impl InstallReport {
    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }
}

/// Runs install jobs on a fixed-size worker pool.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentInstaller {
    pool_size: usize,
}

impl Default for ConcurrentInstaller {
    fn default() -> Self {
        ConcurrentInstaller::new(DEFAULT_POOL_SIZE)
    }
}

impl ConcurrentInstaller {
    pub fn new(pool_size: usize) -> Self {
        ConcurrentInstaller {
            pool_size: pool_size.max(1),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Run every job through `install`, never aborting on a failed job.
    ///
    /// Once `cancel` fires, jobs not yet dispatched come back as
    /// `Skipped(Cancelled)`. `on_progress` runs on the calling thread.
    pub fn run<F>(
        &self,
        jobs: Vec<InstallJob>,
        install: F,
        cancel: &CancelToken,
        on_progress: &mut ProgressFn<'_>,
    ) -> InstallReport
    where
        F: Fn(&InstallJob, &CancelToken) -> JobOutcome + Sync,
    {
        if jobs.is_empty() {
            return InstallReport::default();
        }

        let total = jobs.len();
        let workers = self.pool_size.min(total);

        let (job_tx, job_rx) = unbounded::<(usize, InstallJob)>();
        for entry in jobs.into_iter().enumerate() {
            // The receiver is alive until the end of this function.
            let _ = job_tx.send(entry);
        }
        drop(job_tx);

        let (event_tx, event_rx) = unbounded::<ProgressEvent>();
        let (outcome_tx, outcome_rx) = unbounded::<(usize, JobOutcome)>();
        let mut snapshot = ProgressSnapshot::new(total);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("brewsync-install-{}", i))
            .build();

        let workers = match pool {
            Ok(pool) => {
                tracing::debug!("installing {} packages on {} workers", total, workers);
                pool.in_place_scope(|scope| {
                    for _ in 0..workers {
                        let job_rx = job_rx.clone();
                        let event_tx = event_tx.clone();
                        let outcome_tx = outcome_tx.clone();
                        let install = &install;
                        scope.spawn(move |_| {
                            worker_loop(&job_rx, &event_tx, &outcome_tx, install, cancel)
                        });
                    }
                    drop(event_tx);

                    for event in event_rx.iter() {
                        snapshot.apply(&event);
                        on_progress(&event, &snapshot);
                    }
                });
                workers
            }
            Err(e) => {
                tracing::warn!("could not start install workers ({}), installing serially", e);
                worker_loop(&job_rx, &event_tx, &outcome_tx, &install, cancel);
                drop(event_tx);
                for event in event_rx.try_iter() {
                    snapshot.apply(&event);
                    on_progress(&event, &snapshot);
                }
                1
            }
        };
        drop(outcome_tx);

        let mut slots: Vec<Option<JobOutcome>> = vec![None; total];
        for (idx, outcome) in outcome_rx.try_iter() {
            slots[idx] = Some(outcome);
        }

        InstallReport {
            outcomes: slots.into_iter().flatten().collect(),
            workers,
        }
    }
}

fn worker_loop<F>(
    jobs: &Receiver<(usize, InstallJob)>,
    events: &Sender<ProgressEvent>,
    outcomes: &Sender<(usize, JobOutcome)>,
    install: &F,
    cancel: &CancelToken,
) where
    F: Fn(&InstallJob, &CancelToken) -> JobOutcome + Sync,
{
    for (idx, job) in jobs.iter() {
        let _ = events.send(ProgressEvent::Started {
            name: job.name().to_string(),
            category: job.category(),
        });

        let outcome = if cancel.is_cancelled() {
            JobOutcome::skipped(job.name(), job.category(), SkipReason::Cancelled)
        } else {
            install(&job, cancel)
        };

        let _ = events.send(ProgressEvent::Finished {
            name: job.name().to_string(),
            category: job.category(),
            bucket: outcome.bucket(),
        });
        let _ = outcomes.send((idx, outcome));
    }
}
