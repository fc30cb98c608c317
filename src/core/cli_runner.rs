//! Backend process runner.
//!
//! Provides async subprocess execution for the managed-backend CLI. Every
//! failure mode (missing binary, non-zero exit, timeout) is reported inside
//! [`CommandOutcome`], so callers treat an unavailable tool as data.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Default timeout for backend queries.
pub const CLI_TIMEOUT: Duration = Duration::from_secs(15);

/// A command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    /// Create a command with the default timeout and no working directory.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            timeout: CLI_TIMEOUT,
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    /// Set the hard timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line as a single display string.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output from a command, including every failure mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or -1 when the process could not be spawned, was killed,
    /// or ended by a signal.
    pub exit_code: i32,
    /// Terminating signal on unix.
    pub signal: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutcome {
    /// Outcome for a process that never started.
    #[must_use]
    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            stderr: message.into(),
            exit_code: -1,
            ..Self::default()
        }
    }

    /// Check if command succeeded (exit code 0, not timed out).
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Best short description of why the command failed.
    #[must_use]
    pub fn error_message(&self) -> String {
        if self.timed_out {
            return "command timed out".to_string();
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.chars().take(500).collect();
        }
        match self.signal {
            Some(signal) => format!("terminated by signal {signal}"),
            None => format!("exit code {}", self.exit_code),
        }
    }
}

/// Executes backend commands.
///
/// The production implementation is [`TokioCommandRunner`]; tests substitute
/// scripted runners.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion. Never fails; see [`CommandOutcome`].
    async fn run(&self, spec: &CommandSpec) -> CommandOutcome;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> CommandOutcome {
        run_command(spec).await
    }
}

/// Run a command with its timeout, capturing stdout and stderr.
pub async fn run_command(spec: &CommandSpec) -> CommandOutcome {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!(command = %spec.display(), error = %e, "spawn failed");
            let message = if e.kind() == std::io::ErrorKind::NotFound {
                format!("{}: command not found", spec.program)
            } else {
                e.to_string()
            };
            return CommandOutcome::spawn_failure(message);
        }
    };

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let result = timeout(spec.timeout, async {
        // Drain both pipes concurrently so a chatty stream cannot fill its
        // pipe buffer and block the child.
        let stdout_handle = async {
            let mut buf = Vec::new();
            if let Some(out) = stdout_pipe.as_mut() {
                out.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };

        let stderr_handle = async {
            let mut buf = Vec::new();
            if let Some(err) = stderr_pipe.as_mut() {
                err.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };

        let (stdout_result, stderr_result) = tokio::join!(stdout_handle, stderr_handle);
        let stdout = stdout_result?;
        let stderr = stderr_result?;
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((stdout, stderr, status))
    })
    .await;

    match result {
        Ok(Ok((stdout, stderr, status))) => {
            let outcome = CommandOutcome {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                signal: exit_signal(&status),
                timed_out: false,
            };
            tracing::debug!(
                command = %spec.display(),
                exit_code = outcome.exit_code,
                "command finished"
            );
            outcome
        }
        Ok(Err(e)) => {
            let _ = child.kill().await;
            CommandOutcome::spawn_failure(e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                command = %spec.display(),
                timeout_secs = spec.timeout.as_secs(),
                "command timed out, killing"
            );
            let _ = child.kill().await;
            let _ = child.wait().await;
            CommandOutcome {
                stderr: format!("timed out after {}s", spec.timeout.as_secs()),
                exit_code: -1,
                timed_out: true,
                ..CommandOutcome::default()
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
const fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
