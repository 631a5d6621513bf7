//! Test fixtures for common test scenarios.
//!
//! Desired-state files, canned package-manager output and prepared
//! [`MockRunner`]s for the machine states the tests keep coming back to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::category::{Category, PackageState};
use crate::util::process::RawOutput;

use super::MockRunner;

/// A `Brewsync.toml` declaring one package in every category.
pub const FULL_DESIRED: &str = r#"taps = ["hashicorp/tap"]
formulae = ["git", "curl"]
casks = ["firefox"]
npm = ["typescript"]
"#;

/// A `Brewsync.toml` with only formulae.
pub const FORMULAE_ONLY: &str = r#"formulae = ["git"]
"#;

/// `npm list -g --depth=0 --parseable` output for the given globals.
pub fn npm_listing(names: &[&str]) -> String {
    let prefix = "/opt/homebrew/lib";
    let mut out = format!("{}\n{}/node_modules/npm\n", prefix, prefix);
    for name in names {
        out.push_str(&format!("{}/node_modules/{}\n", prefix, name));
    }
    out
}

/// One name per line, as printed by `brew list -1`.
pub fn brew_listing(names: &[&str]) -> String {
    names.iter().map(|n| format!("{}\n", n)).collect()
}

/// Build a [`PackageState`] from `(category, names)` pairs.
pub fn state(entries: &[(Category, &[&str])]) -> PackageState {
    let mut state = PackageState::default();
    for (category, names) in entries {
        state = state.with(*category, names.iter().copied());
    }
    state
}

/// Fixture for a machine whose package managers report a fixed installed set.
#[derive(Debug, Clone, Default)]
pub struct MachineFixture {
    pub installed: PackageState,
    pub has_npm: bool,
}

impl MachineFixture {
    pub fn new() -> Self {
        MachineFixture {
            installed: PackageState::default(),
            has_npm: true,
        }
    }

    pub fn with(mut self, category: Category, names: &[&str]) -> Self {
        self.installed = self.installed.with(category, names.iter().copied());
        self
    }

    pub fn without_npm(mut self) -> Self {
        self.has_npm = false;
        self
    }

    /// A runner answering the listing commands with this machine's state.
    ///
    /// Every other command succeeds with empty output.
    pub fn runner(&self) -> Arc<MockRunner> {
        let runner = if self.has_npm {
            MockRunner::new()
        } else {
            MockRunner::new().without_program("npm")
        };

        let names = |category: Category| names_in(&self.installed, category);
        runner.expect(
            "brew list --formula -1",
            RawOutput::success(brew_listing(&names(Category::Formula))),
        );
        runner.expect(
            "brew list --cask -1",
            RawOutput::success(brew_listing(&names(Category::Cask))),
        );
        runner.expect(
            "brew tap",
            RawOutput::success(brew_listing(&names(Category::Tap))),
        );
        runner.expect(
            "npm list -g --depth=0 --parseable",
            RawOutput::success(npm_listing(&names(Category::Npm))),
        );
        runner.set_default(RawOutput::success(""));
        Arc::new(runner)
    }
}

fn names_in(state: &PackageState, category: Category) -> Vec<&str> {
    state.get(category).iter().map(String::as_str).collect()
}

/// Write a desired-state file into `dir` and return its path.
pub fn write_desired(dir: &Path, contents: &str) -> std::io::Result<PathBuf> {
    let path = dir.join("Brewsync.toml");
    std::fs::write(&path, contents)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::npm::parse_parseable;

    #[test]
    fn test_npm_listing_round_trips_through_parser() {
        let names = parse_parseable(&npm_listing(&["typescript", "@angular/cli"]));
        assert_eq!(names.len(), 2);
        assert!(names.contains("@angular/cli"));
    }

    #[test]
    fn test_machine_fixture_runner() {
        let runner = MachineFixture::new()
            .with(Category::Formula, &["git", "wget"])
            .runner();
        let out = crate::util::process::CommandRunner::run(
            runner.as_ref(),
            "brew",
            &["list", "--formula", "-1"],
            &crate::util::cancel::CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.combined, "git\nwget\n");
    }

    #[test]
    fn test_state_builder() {
        let s = state(&[(Category::Formula, &["git"]), (Category::Npm, &["a", "b"])]);
        assert_eq!(s.len(), 3);
    }
}
