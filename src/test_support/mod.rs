//! Test utilities and mocks for brewsync unit tests.
//!
//! The main piece is [`MockRunner`], a [`CommandRunner`] that answers
//! package-manager commands from a list of expectations and records every
//! invocation, so tests can assert exactly which subprocesses would have run.
//!
//! # Example
//!
//! ```rust,ignore
//! use brewsync::test_support::MockRunner;
//!
//! let runner = Arc::new(MockRunner::new());
//! runner.expect("brew list --formula -1", RawOutput::success("git\n"));
//! runner.set_default(RawOutput::success(""));
//!
//! let managers = Managers::with_runner(runner.clone());
//! // ...
//! assert_eq!(runner.call_count(), 1);
//! ```

pub mod fixtures;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

pub use fixtures::*;

use crate::util::cancel::CancelToken;
use crate::util::process::{CommandRunner, ProcessError, RawOutput};

/// Pattern for matching commands in [`MockRunner`].
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
    /// Match using a regex pattern.
    Regex(String),
    /// Match any command.
    Any,
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(cmd))
                .unwrap_or(false),
            CommandPattern::Any => true,
        }
    }
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
pub struct CommandExpectation {
    /// Pattern to match against commands.
    pub pattern: CommandPattern,
    /// Output to return when matched.
    pub output: RawOutput,
    /// Number of times this expectation can be used (None = unlimited).
    pub times: Option<usize>,
    /// Number of times this expectation has been used.
    pub used: usize,
}

impl CommandExpectation {
    pub fn new(pattern: CommandPattern, output: RawOutput) -> Self {
        CommandExpectation {
            pattern,
            output,
            times: None,
            used: 0,
        }
    }

    /// Set the number of times this expectation can be used.
    pub fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    fn available(&self) -> bool {
        match self.times {
            Some(n) => self.used < n,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    expectations: Vec<CommandExpectation>,
    calls: Vec<String>,
    default_output: Option<RawOutput>,
}

/// Thread-safe mock of [`CommandRunner`].
///
/// `brew` and `npm` are "installed" unless removed with
/// [`MockRunner::without_program`]. Commands with no matching expectation
/// and no default fail with an `Error: unexpected command` output.
#[derive(Debug)]
pub struct MockRunner {
    state: Mutex<MockState>,
    programs: BTreeSet<String>,
    delay: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner {
            state: Mutex::new(MockState::default()),
            programs: ["brew", "npm"].iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    /// Pretend `program` is not on PATH.
    pub fn without_program(mut self, program: &str) -> Self {
        self.programs.remove(program);
        self
    }

    /// Pretend `program` is on PATH.
    pub fn with_program(mut self, program: &str) -> Self {
        self.programs.insert(program.to_string());
        self
    }

    /// Make every command take at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Add an expectation for an exact command match.
    pub fn expect(&self, cmd: &str, output: RawOutput) -> &Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Exact(cmd.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command starting with a prefix.
    pub fn expect_prefix(&self, prefix: &str, output: RawOutput) -> &Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::StartsWith(prefix.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&self, substring: &str, output: RawOutput) -> &Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Contains(substring.to_string()),
            output,
        ))
    }

    /// Add a custom expectation.
    pub fn expect_pattern(&self, expectation: CommandExpectation) -> &Self {
        self.lock().expectations.push(expectation);
        self
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&self, output: RawOutput) -> &Self {
        self.lock().default_output = Some(output);
        self
    }

    /// All commands run so far, in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of subprocess invocations.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of recorded calls matching `pattern`.
    pub fn count_matching(&self, pattern: &CommandPattern) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| pattern.matches(c))
            .count()
    }

    /// Highest number of commands observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Verify that all expectations with a specific count were satisfied.
    pub fn verify(&self) -> Result<(), String> {
        for (i, exp) in self.lock().expectations.iter().enumerate() {
            if let Some(expected) = exp.times {
                if exp.used != expected {
                    return Err(format!(
                        "expectation {} ({:?}) was used {} times, expected {}",
                        i, exp.pattern, exp.used, expected
                    ));
                }
            }
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn respond(&self, full_cmd: &str) -> RawOutput {
        let mut state = self.lock();
        state.calls.push(full_cmd.to_string());

        for exp in &mut state.expectations {
            if exp.available() && exp.pattern.matches(full_cmd) {
                exp.used += 1;
                return exp.output.clone();
            }
        }

        state
            .default_output
            .clone()
            .unwrap_or_else(|| {
                RawOutput::failure(format!("Error: unexpected command: {}", full_cmd))
            })
    }
}

impl CommandRunner for MockRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.programs
            .contains(program)
            .then(|| PathBuf::from("/opt/homebrew/bin").join(program))
    }

    fn run(
        &self,
        program: &str,
        args: &[&str],
        cancel: &CancelToken,
    ) -> Result<RawOutput, ProcessError> {
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled {
                program: program.to_string(),
            });
        }
        if !self.programs.contains(program) {
            return Err(ProcessError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }

        let full_cmd = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let output = self.respond(&full_cmd);
        self.running.fetch_sub(1, Ordering::SeqCst);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_basic() {
        let runner = MockRunner::new();
        runner.expect("brew --version", RawOutput::success("Homebrew 4.2.0"));
        runner.expect_prefix("npm install", RawOutput::success("added 1 package"));

        let cancel = CancelToken::new();
        let out = runner.run("brew", &["--version"], &cancel).unwrap();
        assert!(out.success);
        assert_eq!(out.combined, "Homebrew 4.2.0");

        let out = runner.run("npm", &["install", "-g", "x"], &cancel).unwrap();
        assert!(out.success);
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn test_mock_runner_unexpected() {
        let runner = MockRunner::new();
        let out = runner.run("brew", &["doctor"], &CancelToken::new()).unwrap();
        assert!(!out.success);
        assert!(out.combined.contains("unexpected command: brew doctor"));
    }

    #[test]
    fn test_mock_runner_times() {
        let runner = MockRunner::new();
        runner.expect_pattern(
            CommandExpectation::new(
                CommandPattern::Exact("brew install git".to_string()),
                RawOutput::failure("Error: timed out"),
            )
            .times(1),
        );
        runner.expect("brew install git", RawOutput::success(""));

        let cancel = CancelToken::new();
        assert!(!runner.run("brew", &["install", "git"], &cancel).unwrap().success);
        assert!(runner.run("brew", &["install", "git"], &cancel).unwrap().success);
        assert!(runner.verify().is_ok());
    }

    #[test]
    fn test_mock_runner_missing_program() {
        let runner = MockRunner::new().without_program("npm");
        assert!(runner.locate("npm").is_none());
        assert!(runner.locate("brew").is_some());

        let result = runner.run("npm", &["list"], &CancelToken::new());
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[test]
    fn test_mock_runner_honours_cancellation() {
        let runner = MockRunner::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = runner.run("brew", &["install", "git"], &cancel);
        assert!(matches!(result, Err(ProcessError::Cancelled { .. })));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_command_pattern_regex() {
        let pattern = CommandPattern::Regex(r"^brew install (--cask )?\w+$".to_string());
        assert!(pattern.matches("brew install git"));
        assert!(pattern.matches("brew install --cask firefox"));
        assert!(!pattern.matches("npm install -g git"));
    }
}
