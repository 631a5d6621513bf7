//! High-level operations.
//!
//! This module contains the implementation of brewsync commands.

pub mod converge;
pub mod doctor;
pub mod install;
pub mod installer;
pub mod maintain;
pub mod preflight;
pub mod progress;
pub mod retry;

pub use converge::{
    diff, execute, execute_with, observe, plan, AggregateFailure, ConvergeError, ConvergencePlan,
    ConvergenceResult, ItemFailure,
};
pub use doctor::{doctor, format_report, DoctorOptions, DoctorReport};
pub use install::{install, InstallOptions, InstallSummary};
pub use installer::{ConcurrentInstaller, InstallReport, DEFAULT_POOL_SIZE};
pub use maintain::{cleanup, outdated, upgrade, MaintenanceReport, MaintenanceStep, StepStatus};
pub use preflight::{PreflightError, PreflightOptions};
pub use progress::{ProgressEvent, ProgressFn, ProgressSnapshot};
pub use retry::{install_npm_batch, RetryPolicy};
