//! Classification of package-manager failure output.
//!
//! Homebrew and npm report failures as free text. This module turns that
//! text into a closed set of [`ErrorKind`]s using an ordered rule table:
//! the first rule whose pattern occurs (case-insensitively) in the output
//! decides the kind. The table is plain data so it can be updated when
//! upstream wording changes without touching the orchestration code.

use std::fmt;

use serde::Serialize;

/// Longest diagnostic line echoed back to the user.
pub const MAX_REPORTED_LEN: usize = 60;

/// Canonical failure categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    /// Not an error: the package is already present.
    AlreadyInstalled,
    NoInternet,
    ConnectionRefused,
    Timeout,
    PermissionDenied,
    DiskFull,
    DownloadCorrupted,
    DependencyConflict,
    /// Another process holds a lock, or a transient signature clash.
    TransientLock,
    /// The package manager binary could not be run.
    ManagerUnavailable,
    /// An explicit `Error:` line from the tool, truncated for display.
    Reported(String),
    Unknown,
}

impl ErrorKind {
    /// Whether a retry has a realistic chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::ConnectionRefused
                | ErrorKind::NoInternet
                | ErrorKind::DownloadCorrupted
                | ErrorKind::TransientLock
        )
    }

    /// Human-readable reason for summaries. Never contains raw output
    /// beyond the truncated diagnostic line of `Reported`.
    pub fn reason(&self) -> String {
        let text = match self {
            ErrorKind::NotFound => "package not found",
            ErrorKind::AlreadyInstalled => "already installed",
            ErrorKind::NoInternet => "no internet connection",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::Timeout => "network timed out",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::DiskFull => "disk is full",
            ErrorKind::DownloadCorrupted => "download corrupted",
            ErrorKind::DependencyConflict => "dependency conflict",
            ErrorKind::TransientLock => "another install is in progress",
            ErrorKind::ManagerUnavailable => "package manager not available",
            ErrorKind::Reported(line) => return line.clone(),
            ErrorKind::Unknown => "install failed",
        };
        text.to_string()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// One entry of the classification table. Patterns are lowercase.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub pattern: &'static str,
    pub kind: RuleKind,
}

/// The kinds a rule can produce (the data-free subset of [`ErrorKind`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    NotFound,
    AlreadyInstalled,
    NoInternet,
    ConnectionRefused,
    Timeout,
    PermissionDenied,
    DiskFull,
    DownloadCorrupted,
    DependencyConflict,
    TransientLock,
}

impl From<RuleKind> for ErrorKind {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::NotFound => ErrorKind::NotFound,
            RuleKind::AlreadyInstalled => ErrorKind::AlreadyInstalled,
            RuleKind::NoInternet => ErrorKind::NoInternet,
            RuleKind::ConnectionRefused => ErrorKind::ConnectionRefused,
            RuleKind::Timeout => ErrorKind::Timeout,
            RuleKind::PermissionDenied => ErrorKind::PermissionDenied,
            RuleKind::DiskFull => ErrorKind::DiskFull,
            RuleKind::DownloadCorrupted => ErrorKind::DownloadCorrupted,
            RuleKind::DependencyConflict => ErrorKind::DependencyConflict,
            RuleKind::TransientLock => ErrorKind::TransientLock,
        }
    }
}

const fn rule(pattern: &'static str, kind: RuleKind) -> Rule {
    Rule { pattern, kind }
}

/// Ordered classification rules. First match wins.
pub const RULES: &[Rule] = &[
    rule("no available formula", RuleKind::NotFound),
    rule("no formulae or casks found", RuleKind::NotFound),
    rule("no available cask", RuleKind::NotFound),
    rule("cask unavailable", RuleKind::NotFound),
    rule("is not in this registry", RuleKind::NotFound),
    rule("404 not found", RuleKind::NotFound),
    rule("code e404", RuleKind::NotFound),
    rule("npm err! 404", RuleKind::NotFound),
    rule("npm error 404", RuleKind::NotFound),
    rule("already installed", RuleKind::AlreadyInstalled),
    rule("could not resolve host", RuleKind::NoInternet),
    rule("network is unreachable", RuleKind::NoInternet),
    rule("enotfound", RuleKind::NoInternet),
    rule("no internet", RuleKind::NoInternet),
    rule("connection refused", RuleKind::ConnectionRefused),
    rule("econnrefused", RuleKind::ConnectionRefused),
    rule("timed out", RuleKind::Timeout),
    rule("etimedout", RuleKind::Timeout),
    rule("timeout", RuleKind::Timeout),
    rule("permission denied", RuleKind::PermissionDenied),
    rule("eacces", RuleKind::PermissionDenied),
    rule("operation not permitted", RuleKind::PermissionDenied),
    rule("no space left on device", RuleKind::DiskFull),
    rule("enospc", RuleKind::DiskFull),
    rule("checksum mismatch", RuleKind::DownloadCorrupted),
    rule("sha256 mismatch", RuleKind::DownloadCorrupted),
    rule("integrity checksum failed", RuleKind::DownloadCorrupted),
    rule("eintegrity", RuleKind::DownloadCorrupted),
    rule("corrupted", RuleKind::DownloadCorrupted),
    rule("conflicts with", RuleKind::DependencyConflict),
    rule("eresolve", RuleKind::DependencyConflict),
    rule("unable to resolve dependency tree", RuleKind::DependencyConflict),
    rule("already running", RuleKind::TransientLock),
    rule("has already locked", RuleKind::TransientLock),
    rule("signature mismatch", RuleKind::TransientLock),
];

/// Line prefixes that mark an explicit diagnostic from the tool.
const DIAGNOSTIC_MARKERS: &[&str] = &["error:", "npm err!", "npm error"];

/// Classify raw output with the default rule table.
pub fn classify(raw: &str) -> ErrorKind {
    classify_with(RULES, raw)
}

/// Classify raw output against an arbitrary ordered table.
pub fn classify_with(rules: &[Rule], raw: &str) -> ErrorKind {
    let lower = raw.to_lowercase();

    if let Some(rule) = rules.iter().find(|r| lower.contains(r.pattern)) {
        return rule.kind.into();
    }

    match reported_line(raw) {
        Some(line) => ErrorKind::Reported(line),
        None => ErrorKind::Unknown,
    }
}

/// Convenience wrapper over [`ErrorKind::is_retryable`].
pub fn is_retryable(kind: &ErrorKind) -> bool {
    kind.is_retryable()
}

/// Find the first explicit diagnostic line, truncated for display.
fn reported_line(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find(|line| {
            let lower = line.to_lowercase();
            DIAGNOSTIC_MARKERS.iter().any(|m| lower.starts_with(m))
        })
        .map(truncate)
}

fn truncate(line: &str) -> String {
    if line.chars().count() <= MAX_REPORTED_LEN {
        line.to_string()
    } else {
        let head: String = line.chars().take(MAX_REPORTED_LEN).collect();
        format!("{}...", head)
    }
}
