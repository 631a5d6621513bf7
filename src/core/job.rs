//! Install jobs and their outcomes.

use std::time::Duration;

use serde::Serialize;

use crate::core::category::Category;
use crate::core::classify::ErrorKind;

/// A single package to install. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstallJob {
    name: String,
    category: Category,
}

impl InstallJob {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        InstallJob {
            name: name.into(),
            category,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

/// Why a job did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    AlreadyInstalled,
    Cancelled,
    DryRun,
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Succeeded,
    Skipped { reason: SkipReason },
    /// Failed without (further) retrying.
    Failed { error: ErrorKind },
    /// Retryable failure that persisted through every allowed attempt.
    RetriesExhausted { error: ErrorKind, attempts: u32 },
}

/// Progress tally a finished job counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of running one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub name: String,
    pub category: Category,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Raw combined output of the last attempt, kept for logs only.
    #[serde(skip)]
    pub detail: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    pub attempts: u32,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl JobOutcome {
    fn new(name: impl Into<String>, category: Category, status: OutcomeStatus) -> Self {
        JobOutcome {
            name: name.into(),
            category,
            status,
            detail: None,
            duration: Duration::ZERO,
            attempts: 1,
        }
    }

    pub fn succeeded(name: impl Into<String>, category: Category) -> Self {
        Self::new(name, category, OutcomeStatus::Succeeded)
    }

    pub fn skipped(name: impl Into<String>, category: Category, reason: SkipReason) -> Self {
        let mut outcome = Self::new(name, category, OutcomeStatus::Skipped { reason });
        outcome.attempts = 0;
        outcome
    }

    pub fn failed(name: impl Into<String>, category: Category, error: ErrorKind) -> Self {
        Self::new(name, category, OutcomeStatus::Failed { error })
    }

    pub fn retries_exhausted(
        name: impl Into<String>,
        category: Category,
        error: ErrorKind,
        attempts: u32,
    ) -> Self {
        let mut outcome =
            Self::new(name, category, OutcomeStatus::RetriesExhausted { error, attempts });
        outcome.attempts = attempts;
        outcome
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::Succeeded | OutcomeStatus::Skipped { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The classified error, if the job failed.
    pub fn error(&self) -> Option<&ErrorKind> {
        match &self.status {
            OutcomeStatus::Failed { error } | OutcomeStatus::RetriesExhausted { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }

    pub fn bucket(&self) -> Bucket {
        match self.status {
            OutcomeStatus::Succeeded => Bucket::Succeeded,
            OutcomeStatus::Skipped { .. } => Bucket::Skipped,
            OutcomeStatus::Failed { .. } | OutcomeStatus::RetriesExhausted { .. } => {
                Bucket::Failed
            }
        }
    }

    /// Human-readable reason for a failure summary.
    pub fn reason(&self) -> Option<String> {
        match &self.status {
            OutcomeStatus::Failed { error } => Some(error.reason()),
            OutcomeStatus::RetriesExhausted { error, attempts } => Some(format!(
                "{} (gave up after {} attempts)",
                error.reason(),
                attempts
            )),
            _ => None,
        }
    }
}
