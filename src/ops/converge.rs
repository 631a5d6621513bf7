//! Convergence: find what is installed but no longer wanted, then remove it.
//!
//! [`observe`] queries the live installed state, [`diff`] computes the
//! removal plan, and [`execute`] applies it one package at a time.
//! Removal is sequential and fail-soft: every item is attempted and every
//! failure is itemized in an [`AggregateFailure`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::category::{Category, DesiredState, InstalledState, PackageState};
use crate::core::classify::ErrorKind;
use crate::core::job::{Bucket, JobOutcome};
use crate::core::manager::{ManagerError, Managers, PackageManager};
use crate::util::cancel::CancelToken;

/// Error observing installed state.
#[derive(Debug, Error)]
pub enum ConvergeError {
    #[error("failed to list installed {}", category.plural())]
    List {
        category: Category,
        #[source]
        source: ManagerError,
    },
}

/// Packages installed but absent from the desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvergencePlan {
    pub extra: PackageState,
}

impl ConvergencePlan {
    pub fn is_empty(&self) -> bool {
        self.extra.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extra.len()
    }
}

/// One package that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub name: String,
    pub category: Category,
    pub error: ErrorKind,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.category, self.name, self.error.reason())
    }
}

/// N of M removals failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateFailure {
    pub failures: Vec<ItemFailure>,
    pub attempted: usize,
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} removals failed",
            self.failures.len(),
            self.attempted
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {}

/// What a removal pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvergenceResult {
    pub removed: PackageState,
    pub failed: BTreeMap<Category, Vec<ItemFailure>>,
    pub error: Option<AggregateFailure>,
}

impl ConvergenceResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// `installed \ desired`, per category.
pub fn diff(desired: &DesiredState, installed: &InstalledState) -> ConvergencePlan {
    let mut extra = PackageState::default();
    for category in Category::INSTALL_ORDER {
        extra.set(
            category,
            installed
                .get(category)
                .difference(desired.get(category))
                .cloned()
                .collect(),
        );
    }
    ConvergencePlan { extra }
}

/// Query what is installed right now.
///
/// Formulae and casks are always listed. Taps and npm globals are only
/// listed when the desired state names at least one of them and the
/// owning manager is present; otherwise they count as empty, so they are
/// never planned for removal.
pub fn observe(
    managers: &Managers,
    desired: &DesiredState,
) -> Result<InstalledState, ConvergeError> {
    let mut installed = InstalledState::default();

    for category in Category::INSTALL_ORDER {
        let manager = managers.for_category(category);
        if category.is_optional() && (desired.get(category).is_empty() || !manager.is_available()) {
            tracing::debug!("not probing {}", category.plural());
            continue;
        }

        let names = manager
            .list_installed(category)
            .map_err(|source| ConvergeError::List { category, source })?;
        tracing::debug!("{} {} installed", names.len(), category.plural());
        installed.set(category, names);
    }

    Ok(installed)
}

/// Observe, then diff.
pub fn plan(managers: &Managers, desired: &DesiredState) -> Result<ConvergencePlan, ConvergeError> {
    let installed = observe(managers, desired)?;
    Ok(diff(desired, &installed))
}

/// Remove everything in `plan`, sequentially, in removal order.
pub fn execute(
    plan: &ConvergencePlan,
    managers: &Managers,
    dry_run: bool,
    cancel: &CancelToken,
) -> ConvergenceResult {
    execute_with(plan, managers, dry_run, cancel, &mut |_| {})
}

/// [`execute`], reporting each finished removal to `on_item`.
pub fn execute_with(
    plan: &ConvergencePlan,
    managers: &Managers,
    dry_run: bool,
    cancel: &CancelToken,
    on_item: &mut dyn FnMut(&JobOutcome),
) -> ConvergenceResult {
    let mut result = ConvergenceResult::default();
    if dry_run {
        return result;
    }

    let mut failures = Vec::new();
    let mut attempted = 0;

    for category in Category::REMOVAL_ORDER {
        let manager = managers.for_category(category);
        for name in plan.extra.get(category) {
            if cancel.is_cancelled() {
                tracing::info!("removal cancelled, {} left in place", name);
                continue;
            }

            attempted += 1;
            let outcome = manager.uninstall_one(name, category, cancel);
            on_item(&outcome);

            match outcome.bucket() {
                Bucket::Succeeded => {
                    result.removed.get_mut(category).insert(name.clone());
                }
                Bucket::Skipped => {}
                Bucket::Failed => {
                    let failure = ItemFailure {
                        name: name.clone(),
                        category,
                        error: outcome.error().cloned().unwrap_or(ErrorKind::Unknown),
                    };
                    result
                        .failed
                        .entry(category)
                        .or_default()
                        .push(failure.clone());
                    failures.push(failure);
                }
            }
        }
    }

    if !failures.is_empty() {
        result.error = Some(AggregateFailure {
            failures,
            attempted,
        });
    }
    result
}
