//! Subprocess execution utilities.
//!
//! Package managers are only ever reached through [`CommandRunner`], so the
//! orchestration code can be exercised against a mock runner in tests.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::util::cancel::CancelToken;

/// How often a running child is polled for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Failure to run a subprocess at all (as opposed to a non-zero exit).
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` was cancelled")]
    Cancelled { program: String },
}

/// Exit verdict and combined output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub success: bool,
    /// Standard output followed by standard error.
    pub combined: String,
}

impl RawOutput {
    pub fn success(combined: impl Into<String>) -> Self {
        RawOutput {
            success: true,
            combined: combined.into(),
        }
    }

    pub fn failure(combined: impl Into<String>) -> Self {
        RawOutput {
            success: false,
            combined: combined.into(),
        }
    }
}

/// Executes package-manager commands.
pub trait CommandRunner: Send + Sync {
    /// Locate a program on PATH.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run a program to completion, or until `cancel` fires.
    fn run(&self, program: &str, args: &[&str], cancel: &CancelToken)
        -> Result<RawOutput, ProcessError>;
}

/// Runs real subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        find_executable(program)
    }

    fn run(
        &self,
        program: &str,
        args: &[&str],
        cancel: &CancelToken,
    ) -> Result<RawOutput, ProcessError> {
        let builder = ProcessBuilder::new(program).args(args);
        tracing::debug!("running `{}`", builder.display_command());

        let finished = builder.exec_cancellable(cancel)?;
        tracing::trace!(
            "`{}` exited with {:?}:\n{}",
            builder.display_command(),
            finished.status.code(),
            finished.combined
        );

        Ok(RawOutput {
            success: finished.status.success(),
            combined: finished.combined,
        })
    }
}

/// Status and captured output of a subprocess.
#[derive(Debug)]
pub struct FinishedProcess {
    pub status: ExitStatus,
    pub combined: String,
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        // Homebrew otherwise stops to ask questions or auto-updates mid-install.
        cmd.env("HOMEBREW_NO_AUTO_UPDATE", "1");
        cmd.env("NONINTERACTIVE", "1");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Execute the command, killing it if `cancel` fires before it exits.
    pub fn exec_cancellable(&self, cancel: &CancelToken) -> Result<FinishedProcess, ProcessError> {
        let program = self.program.display().to_string();

        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { program });
        }

        let mut child = self
            .build_command()
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_or_cancel(&mut child, cancel) {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::debug!("killing `{}` after cancellation", self.display_command());
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Cancelled { program });
            }
            Err(source) => return Err(ProcessError::Wait { program, source }),
        };

        let mut combined = stdout.join().unwrap_or_default();
        let err_text = stderr.join().unwrap_or_default();
        if !err_text.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&err_text);
        }

        Ok(FinishedProcess { status, combined })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Poll until the child exits (`Some`) or cancellation is requested (`None`).
fn wait_or_cancel(child: &mut Child, cancel: &CancelToken) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to completion on its own thread so a full pipe never blocks the child.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}
