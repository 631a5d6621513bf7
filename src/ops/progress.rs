//! Install progress events and their aggregation.
//!
//! Workers never share counters: each one sends [`ProgressEvent`]s down a
//! channel and a single consumer folds them into a [`ProgressSnapshot`].

use serde::Serialize;

use crate::core::category::Category;
use crate::core::job::Bucket;

/// Something that happened to one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProgressEvent {
    Started {
        name: String,
        category: Category,
    },
    Finished {
        name: String,
        category: Category,
        bucket: Bucket,
    },
}

impl ProgressEvent {
    pub fn name(&self) -> &str {
        match self {
            ProgressEvent::Started { name, .. } | ProgressEvent::Finished { name, .. } => name,
        }
    }
}

/// Running totals over a batch of jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Most recently started job.
    pub current: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ProgressSnapshot {
    pub fn new(total: usize) -> Self {
        ProgressSnapshot {
            total,
            ..Default::default()
        }
    }

    /// Fold one event into the totals.
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { name, .. } => {
                self.current = Some(name.clone());
            }
            ProgressEvent::Finished { bucket, .. } => {
                self.completed += 1;
                match bucket {
                    Bucket::Succeeded => self.succeeded += 1,
                    Bucket::Failed => self.failed += 1,
                    Bucket::Skipped => self.skipped += 1,
                }
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }

    /// Completed fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Callback invoked with the event that just arrived and the updated totals.
pub type ProgressFn<'a> = dyn FnMut(&ProgressEvent, &ProgressSnapshot) + 'a;
