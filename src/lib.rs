//! brewsync - keep a Mac's Homebrew and npm packages in line with a declared list
//!
//! This crate provides the library behind the `brewsync` CLI: package-manager
//! adapters, failure classification, the concurrent installer with npm
//! retries, and the convergence pass that removes what is no longer wanted.

pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for brewsync unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a scriptable [`CommandRunner`](util::process::CommandRunner)
/// and fixtures for common machine states.
#[cfg(test)]
pub mod test_support;

pub use core::{
    Category, DesiredState, ErrorKind, InstallJob, InstalledState, JobOutcome, Managers,
    PackageManager, PackageState,
};

pub use util::cancel::CancelToken;
pub use util::context::GlobalContext;
