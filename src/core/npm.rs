//! npm adapter: globally installed packages.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::core::category::Category;
use crate::core::classify::classify;
use crate::core::job::JobOutcome;
use crate::core::manager::{outcome_from, ManagerError, PackageManager};
use crate::util::cancel::CancelToken;
use crate::util::process::{CommandRunner, ProcessError, RawOutput};

const NPM: &str = "npm";

/// Globals that ship with npm itself and must never be removed.
const BUNDLED: &[&str] = &["npm", "corepack"];

/// npm driven through a [`CommandRunner`]. Optional: a missing binary
/// degrades to an empty installed set.
pub struct Npm {
    runner: Arc<dyn CommandRunner>,
}

impl Npm {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Npm { runner }
    }

    pub fn locate(&self) -> Option<PathBuf> {
        self.runner.locate(NPM)
    }

    /// Install several globals with a single `npm install -g`.
    pub fn install_batch(
        &self,
        names: &[String],
        cancel: &CancelToken,
    ) -> Result<RawOutput, ProcessError> {
        let mut args = vec!["install", "-g"];
        args.extend(names.iter().map(String::as_str));
        tracing::debug!("batch installing {} npm globals", names.len());
        self.runner.run(NPM, &args, cancel)
    }
}

/// Parse `npm list -g --depth=0 --parseable`.
///
/// Each line is an absolute install path; the first is the global prefix
/// itself. Scoped packages keep their `@scope/` prefix.
pub fn parse_parseable(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(package_from_path)
        .filter(|name| !BUNDLED.contains(&name.as_str()))
        .collect()
}

fn package_from_path(line: &str) -> Option<String> {
    let segments: Vec<&str> = line
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        [.., "node_modules", name] => Some(name.to_string()),
        [.., "node_modules", scope, name] if scope.starts_with('@') => {
            Some(format!("{}/{}", scope, name))
        }
        _ => None,
    }
}

impl PackageManager for Npm {
    fn name(&self) -> &'static str {
        NPM
    }

    fn categories(&self) -> &'static [Category] {
        &[Category::Npm]
    }

    fn is_available(&self) -> bool {
        self.locate().is_some()
    }

    fn list_installed(&self, category: Category) -> Result<BTreeSet<String>, ManagerError> {
        if category != Category::Npm {
            return Err(ManagerError::UnsupportedCategory {
                manager: NPM,
                category,
            });
        }
        if !self.is_available() {
            tracing::debug!("npm not found, treating globals as empty");
            return Ok(BTreeSet::new());
        }

        let out = self.runner.run(
            NPM,
            &["list", "-g", "--depth=0", "--parseable"],
            &CancelToken::new(),
        )?;
        // npm exits non-zero on peer-dependency warnings while still
        // printing a complete listing.
        let listed_any = out
            .combined
            .lines()
            .any(|line| package_from_path(line.trim()).is_some());
        if !out.success && !listed_any {
            return Err(ManagerError::CommandFailed {
                command: "npm list -g --depth=0 --parseable".to_string(),
                reason: classify(&out.combined),
            });
        }
        Ok(parse_parseable(&out.combined))
    }

    fn install_one(&self, name: &str, category: Category, cancel: &CancelToken) -> JobOutcome {
        let started = Instant::now();
        let result = self.runner.run(NPM, &["install", "-g", name], cancel);
        outcome_from(name, category, result, started)
    }

    fn uninstall_one(&self, name: &str, category: Category, cancel: &CancelToken) -> JobOutcome {
        let started = Instant::now();
        let result = self.runner.run(NPM, &["uninstall", "-g", name], cancel);
        outcome_from(name, category, result, started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::ErrorKind;
    use crate::core::job::OutcomeStatus;
    use crate::test_support::MockRunner;

    const LISTING: &str = "/opt/homebrew/lib
/opt/homebrew/lib/node_modules/@angular/cli
/opt/homebrew/lib/node_modules/corepack
/opt/homebrew/lib/node_modules/npm
/opt/homebrew/lib/node_modules/typescript
";

    #[test]
    fn test_parse_parseable() {
        let names = parse_parseable(LISTING);

        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["@angular/cli".to_string(), "typescript".to_string()]
        );
    }

    #[test]
    fn test_parse_windows_paths() {
        let names = parse_parseable(
            "C:\\Users\\me\\AppData\\Roaming\\npm\nC:\\Users\\me\\AppData\\Roaming\\npm\\node_modules\\pnpm\n",
        );
        assert!(names.contains("pnpm"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_list_without_npm_is_empty() {
        let runner = Arc::new(MockRunner::new().without_program("npm"));
        let npm = Npm::new(runner.clone());

        let names = npm.list_installed(Category::Npm).unwrap();

        assert!(names.is_empty());
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_list_tolerates_nonzero_exit_with_output() {
        let runner = Arc::new(MockRunner::new());
        runner.expect(
            "npm list -g --depth=0 --parseable",
            RawOutput::failure(LISTING),
        );

        let names = Npm::new(runner).list_installed(Category::Npm).unwrap();

        assert!(names.contains("typescript"));
    }

    #[test]
    fn test_list_failure_without_listing_is_an_error() {
        let runner = Arc::new(MockRunner::new());
        runner.expect(
            "npm list -g --depth=0 --parseable",
            RawOutput::failure(
                "npm ERR! code EACCES\nnpm ERR! permission denied, open '/usr/local/lib'",
            ),
        );

        let err = Npm::new(runner).list_installed(Category::Npm).unwrap_err();

        match err {
            ManagerError::CommandFailed { reason, .. } => {
                assert_eq!(reason, ErrorKind::PermissionDenied)
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_install_and_uninstall_commands() {
        let runner = Arc::new(MockRunner::new());
        runner.set_default(RawOutput::success(""));
        let npm = Npm::new(runner.clone());
        let cancel = CancelToken::new();

        let installed = npm.install_one("typescript", Category::Npm, &cancel);
        let removed = npm.uninstall_one("typescript", Category::Npm, &cancel);
        npm.install_batch(&["a".to_string(), "@b/c".to_string()], &cancel)
            .unwrap();

        assert_eq!(installed.status, OutcomeStatus::Succeeded);
        assert_eq!(removed.status, OutcomeStatus::Succeeded);
        assert_eq!(
            runner.calls(),
            vec![
                "npm install -g typescript",
                "npm uninstall -g typescript",
                "npm install -g a @b/c",
            ]
        );
    }
}
