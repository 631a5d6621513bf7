//! Core data structures and package-manager adapters.
//!
//! This module contains the foundational types used throughout brewsync:
//! - Categories and per-category package sets
//! - Install jobs and their outcomes
//! - Classification of failure output
//! - The Homebrew and npm adapters

pub mod category;
pub mod classify;
pub mod homebrew;
pub mod job;
pub mod manager;
pub mod npm;

pub use category::{Category, DesiredState, InstalledState, PackageState};
pub use classify::{classify, is_retryable, ErrorKind};
pub use homebrew::{CaskFallback, Homebrew, MaintenanceCommand, OutdatedPackage};
pub use job::{Bucket, InstallJob, JobOutcome, OutcomeStatus, SkipReason};
pub use manager::{ManagerError, Managers, PackageManager};
pub use npm::Npm;
