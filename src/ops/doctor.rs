//! Environment health checks.
//!
//! The `doctor` command verifies that the package managers brewsync drives
//! are installed and working.
//!
//! ## Usage
//!
//! ```bash
//! brewsync doctor           # Quick check
//! brewsync doctor --verbose # Detailed output
//! ```
//!
//! ## Checks Performed
//!
//! - Homebrew availability and `brew doctor`
//! - npm availability (optional)
//! - Git availability (Homebrew fetches taps with it)
//! - Network connectivity to the package hosts (optional)

use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ops::preflight::{check_reachable, PreflightOptions};
use crate::util::cancel::CancelToken;
use crate::util::process::CommandRunner;

/// Result of a single health check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,

    /// Whether the check passed
    pub passed: bool,

    /// Human-readable status message
    pub message: String,

    /// Path to the tool (if applicable)
    pub path: Option<PathBuf>,

    /// Version string (if applicable)
    pub version: Option<String>,

    /// How long the check took
    #[serde(skip)]
    pub duration: Duration,

    /// Whether this check is required or optional
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: false,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,

    #[serde(skip)]
    pub total_duration: Duration,

    pub environment: HashMap<String, String>,
}

impl DoctorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Check if all required checks passed.
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn required_failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .count()
    }
}

/// Options for the doctor command.
#[derive(Debug, Clone, Default)]
pub struct DoctorOptions {
    /// Skip network checks
    pub offline: bool,

    /// Hosts and timeout for the network checks
    pub preflight: PreflightOptions,
}

/// Run every check.
pub fn doctor(runner: &dyn CommandRunner, options: &DoctorOptions) -> DoctorReport {
    let start = Instant::now();
    let mut report = DoctorReport::new();

    report
        .environment
        .insert("os".to_string(), std::env::consts::OS.to_string());
    report
        .environment
        .insert("arch".to_string(), std::env::consts::ARCH.to_string());

    let brew = check_tool(runner, "Homebrew", "brew", "required for formulae, casks and taps");
    let brew_present = brew.passed;
    report.add(brew);
    report.add(check_tool(runner, "Git", "git", "Homebrew needs git to fetch taps"));
    report.add(
        check_tool(runner, "npm", "npm", "optional, needed for npm globals").optional(),
    );

    if brew_present {
        report.add(check_brew_doctor(runner));
    }

    if !options.offline {
        for host in &options.preflight.hosts {
            report.add(check_network(host, options.preflight.timeout));
        }
    }

    report.total_duration = start.elapsed();
    report
}

/// Locate `program` and ask it for its version.
fn check_tool(runner: &dyn CommandRunner, name: &str, program: &str, missing: &str) -> CheckResult {
    let start = Instant::now();

    let Some(path) = runner.locate(program) else {
        return CheckResult::fail(name, format!("{} not found ({})", program, missing))
            .with_duration(start.elapsed());
    };

    let version = runner
        .run(program, &["--version"], &CancelToken::new())
        .ok()
        .filter(|out| out.success)
        .and_then(|out| out.combined.lines().next().map(|l| l.trim().to_string()))
        .unwrap_or_else(|| "unknown version".to_string());

    CheckResult::pass(name, format!("{} is available", program))
        .with_path(path)
        .with_version(version)
        .with_duration(start.elapsed())
}

/// `brew doctor` exits non-zero whenever it has a warning, most of which are
/// harmless, so this check is optional.
fn check_brew_doctor(runner: &dyn CommandRunner) -> CheckResult {
    let start = Instant::now();

    match runner.run("brew", &["doctor"], &CancelToken::new()) {
        Ok(out) if out.success => {
            CheckResult::pass("brew doctor", "Your system is ready to brew")
                .with_duration(start.elapsed())
                .optional()
        }
        Ok(out) => {
            let warnings = out
                .combined
                .lines()
                .filter(|l| l.starts_with("Warning:"))
                .count();
            let first = out
                .combined
                .lines()
                .find(|l| l.starts_with("Warning:"))
                .unwrap_or("brew doctor reported problems")
                .trim()
                .to_string();
            CheckResult::fail("brew doctor", format!("{} warning(s); {}", warnings, first))
                .with_duration(start.elapsed())
                .optional()
        }
        Err(e) => CheckResult::fail("brew doctor", e.to_string())
            .with_duration(start.elapsed())
            .optional(),
    }
}

fn check_network(host: &str, timeout: Duration) -> CheckResult {
    let start = Instant::now();
    let name = format!("Network ({})", host);

    match check_reachable(host, timeout) {
        Ok(()) => CheckResult::pass(name, "reachable")
            .with_duration(start.elapsed())
            .optional(),
        Err(e) => CheckResult::fail(name, e.to_string())
            .with_duration(start.elapsed())
            .optional(),
    }
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "brewsync doctor");
    let _ = writeln!(output, "===============\n");

    if verbose {
        let unknown = "unknown".to_string();
        let _ = writeln!(output, "Environment:");
        let _ = writeln!(
            output,
            "  OS: {} ({})",
            report.environment.get("os").unwrap_or(&unknown),
            report.environment.get("arch").unwrap_or(&unknown)
        );
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "Checks:");
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };
        let _ = writeln!(output, "  {} {}{}", status, check.name, required);

        if verbose || !check.passed {
            let _ = writeln!(output, "      {}", check.message);
        }
        if verbose {
            if let Some(path) = &check.path {
                let _ = writeln!(output, "      Path: {}", path.display());
            }
            if let Some(version) = &check.version {
                let _ = writeln!(output, "      Version: {}", version);
            }
        }
    }

    let _ = writeln!(output);

    let passed = report.passed_count();
    let failed = report.failed_count();
    let required_failed = report.required_failed_count();

    let _ = writeln!(output, "Summary: {} passed, {} failed", passed, failed);

    if required_failed > 0 {
        let _ = writeln!(
            output,
            "\nWarning: {} required check(s) failed. brewsync cannot install packages.",
            required_failed
        );
    } else if failed > 0 {
        let _ = writeln!(
            output,
            "\nAll required checks passed. {} optional check(s) failed.",
            failed
        );
    } else {
        let _ = writeln!(output, "\nAll checks passed. brewsync is ready to use.");
    }

    output
}
