//! User-friendly diagnostic messages.
//!
//! Every failure reported to the user names what went wrong per package and
//! what to try next. Raw package-manager output never appears here; it is
//! only logged at debug level.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::core::category::Category;
use crate::core::classify::ErrorKind;
use crate::core::job::JobOutcome;
use crate::ops::converge::ConvergenceResult;
use crate::ops::install::InstallSummary;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// No `Brewsync.toml` was found.
    pub const NO_DESIRED_FILE: &str =
        "Create a Brewsync.toml listing your taps, formulae, casks and npm globals";

    /// Homebrew is missing.
    pub const INSTALL_HOMEBREW: &str = "Install Homebrew from https://brew.sh";

    /// The network dropped out mid-run.
    pub const CHECK_NETWORK: &str = "Check your network connection and run the command again";

    /// Homebrew-owned directories are not writable.
    pub const FIX_PERMISSIONS: &str =
        "Make the Homebrew prefix writable by your user: `sudo chown -R $(whoami) $(brew --prefix)`";

    pub const FREE_DISK: &str = "Free up disk space, e.g. with `brewsync maintain`";

    pub const SEARCH_PACKAGE: &str =
        "Check the package name with `brew search <name>` or `npm view <name>`";

    /// Another brew or npm process holds a lock.
    pub const WAIT_FOR_LOCK: &str =
        "Wait for the other Homebrew or npm process to finish, then run again";

    pub const VERBOSE: &str = "Run with --verbose to see the package manager output";

    pub const RUN_DOCTOR: &str = "Run `brewsync doctor` to check your setup";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related file
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion. Duplicates are ignored.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        let suggestion = suggestion.into();
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (self.severity, color) {
            (Severity::Error, true) => "\x1b[1;31merror\x1b[0m",
            (Severity::Warning, true) => "\x1b[1;33mwarning\x1b[0m",
            (Severity::Error, false) => "error",
            (Severity::Warning, false) => "warning",
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color { "\x1b[1;32mhelp\x1b[0m" } else { "help" };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Suggestion matching a classified failure, if there is a useful one.
pub fn suggestion_for(error: &ErrorKind) -> Option<&'static str> {
    match error {
        ErrorKind::NoInternet | ErrorKind::ConnectionRefused | ErrorKind::Timeout => {
            Some(suggestions::CHECK_NETWORK)
        }
        ErrorKind::PermissionDenied => Some(suggestions::FIX_PERMISSIONS),
        ErrorKind::DiskFull => Some(suggestions::FREE_DISK),
        ErrorKind::NotFound => Some(suggestions::SEARCH_PACKAGE),
        ErrorKind::TransientLock => Some(suggestions::WAIT_FOR_LOCK),
        ErrorKind::ManagerUnavailable => Some(suggestions::RUN_DOCTOR),
        _ => None,
    }
}

/// One context line per category: `formulae: foo (package not found), ...`.
fn grouped_lines<'a, I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = (Category, &'a str, String)>,
{
    let mut lines = Vec::new();
    let mut current: Option<(Category, Vec<String>)> = None;

    for (category, name, reason) in items {
        match &mut current {
            Some((c, entries)) if *c == category => {
                entries.push(format!("{} ({})", name, reason));
            }
            _ => {
                if let Some((c, entries)) = current.take() {
                    lines.push(format!("{}: {}", c.plural(), entries.join(", ")));
                }
                current = Some((category, vec![format!("{} ({})", name, reason)]));
            }
        }
    }
    if let Some((c, entries)) = current {
        lines.push(format!("{}: {}", c.plural(), entries.join(", ")));
    }
    lines
}

/// Summary of failed installs, or `None` when everything succeeded.
pub fn install_failure_summary(summary: &InstallSummary) -> Option<Diagnostic> {
    let grouped = summary.failures_by_category();
    let failed: Vec<&JobOutcome> = grouped.values().flatten().copied().collect();
    if failed.is_empty() {
        return None;
    }

    let mut diag = Diagnostic::error(format!(
        "{} of {} packages failed to install",
        failed.len(),
        summary.outcomes.len()
    ));

    let items = failed.iter().map(|o| {
        (
            o.category,
            o.name.as_str(),
            o.reason().unwrap_or_else(|| "install failed".to_string()),
        )
    });
    for line in grouped_lines(items) {
        diag = diag.with_context(line);
    }

    let kinds: BTreeSet<&'static str> = failed
        .iter()
        .filter_map(|o| o.error())
        .filter_map(suggestion_for)
        .collect();
    for suggestion in kinds {
        diag = diag.with_suggestion(suggestion);
    }
    Some(diag.with_suggestion(suggestions::VERBOSE))
}

/// Summary of failed removals, or `None` when every removal succeeded.
pub fn removal_failure_summary(result: &ConvergenceResult) -> Option<Diagnostic> {
    let aggregate = result.error.as_ref()?;

    let mut diag = Diagnostic::error(format!(
        "{} of {} removals failed",
        aggregate.failures.len(),
        aggregate.attempted
    ));

    let items = aggregate
        .failures
        .iter()
        .map(|f| (f.category, f.name.as_str(), f.error.reason()));
    for line in grouped_lines(items) {
        diag = diag.with_context(line);
    }

    for failure in &aggregate.failures {
        if let Some(suggestion) = suggestion_for(&failure.error) {
            diag = diag.with_suggestion(suggestion);
        }
    }
    Some(diag.with_suggestion(suggestions::VERBOSE))
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
