//! Test utilities for proxydash.
//!
//! Provides a scripted [`CommandRunner`], credential fixtures and an
//! isolated temporary directory for use across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use proxydash::test_utils::*;
//!
//! let runner = ScriptedRunner::new()
//!     .on(&["compose", "ps"], failed(1, "no configuration file provided"))
//!     .on(&["ps"], succeeded(r#"{"Names":"cli-proxy-api","State":"running"}"#));
//!
//! let dir = TestDir::new();
//! dir.create_file("claude.json", &credential_json("claude", Some(expires_in_hours(10))));
//! ```

use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::core::cli_runner::{CommandOutcome, CommandRunner, CommandSpec};
use crate::storage::config::Settings;

// =============================================================================
// Scripted Runner
// =============================================================================

/// A [`CommandRunner`] that answers from a script instead of spawning.
///
/// Each rule matches when the command's arguments start with the rule's
/// prefix; the first matching rule wins. Unmatched commands look like a
/// missing binary. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<(Vec<String>, CommandOutcome)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose arguments start with `prefix`.
    #[must_use]
    pub fn on(mut self, prefix: &[&str], outcome: CommandOutcome) -> Self {
        self.rules
            .push((prefix.iter().map(ToString::to_string).collect(), outcome));
        self
    }

    /// Commands run so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if a previous holder of the lock panicked.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    fn answer(&self, spec: &CommandSpec) -> CommandOutcome {
        self.rules
            .iter()
            .find(|(prefix, _)| spec.args.starts_with(prefix))
            .map_or_else(
                || CommandOutcome::spawn_failure(format!("{}: command not found", spec.program)),
                |(_, outcome)| outcome.clone(),
            )
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> CommandOutcome {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(spec.clone());
        self.answer(spec)
    }
}

/// Successful outcome with the given stdout.
#[must_use]
pub fn succeeded(stdout: &str) -> CommandOutcome {
    CommandOutcome {
        stdout: stdout.to_string(),
        ..CommandOutcome::default()
    }
}

/// Failed outcome with the given exit code and stderr.
#[must_use]
pub fn failed(exit_code: i32, stderr: &str) -> CommandOutcome {
    CommandOutcome {
        stderr: stderr.to_string(),
        exit_code,
        ..CommandOutcome::default()
    }
}

/// Outcome of a command killed by its timeout.
#[must_use]
pub fn timed_out() -> CommandOutcome {
    CommandOutcome {
        exit_code: -1,
        timed_out: true,
        ..CommandOutcome::default()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// `docker compose ps --format json` output for one service.
#[must_use]
pub fn compose_ps_json(service: &str, state: &str, status: &str) -> String {
    format!(
        r#"[{{"Service":"{service}","Name":"{service}-1","State":"{state}","Status":"{status}","Image":"eceasy/cli-proxy-api:latest","RunningFor":"2 hours ago","ExitCode":0}}]"#
    )
}

/// `docker ps --format {{json .}}` output for one container.
#[must_use]
pub fn container_ps_json(name: &str, state: &str, status: &str) -> String {
    format!(
        r#"{{"Names":"{name}","State":"{state}","Status":"{status}","Image":"eceasy/cli-proxy-api:latest","RunningFor":"2 hours ago","CreatedAt":"2026-10-15 10:00:00 +0000 UTC"}}"#
    )
}

/// RFC 3339 timestamp `hours` from now (negative for the past).
#[must_use]
pub fn expires_in_hours(hours: i64) -> String {
    (Utc::now() + TimeDelta::hours(hours)).to_rfc3339()
}

/// A credential file body with a provider type and optional expiry.
#[must_use]
pub fn credential_json(provider: &str, expired: Option<String>) -> String {
    match expired {
        Some(at) => format!(
            r#"{{"type":"{provider}","email":"dev@example.com","access_token":"redacted","expired":"{at}"}}"#
        ),
        None => format!(r#"{{"type":"{provider}","email":"dev@example.com"}}"#),
    }
}

/// Settings pointing every path into `root`, with no compose file.
#[must_use]
pub fn settings_in(root: &Path) -> Settings {
    Settings {
        project_dir: root.to_path_buf(),
        auth_dir: root.join("auths"),
        proxy_config_path: root.join("config.yaml"),
        ..Settings::default()
    }
}

/// Fixed instant for deterministic freshness checks.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

// =============================================================================
// Temporary Directory
// =============================================================================

/// An isolated temporary directory, removed on drop.
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file, creating parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    /// Create a subdirectory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    pub fn create_dir(&self, name: &str) {
        fs::create_dir_all(self.inner.path().join(name)).expect("Failed to create test directory");
    }

    /// Read a file back.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }

    /// Create an executable script and return its path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written or made executable.
    #[cfg(unix)]
    pub fn create_executable(&self, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        self.create_file(name, script);
        let path = self.file_path(name);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        path
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Child Processes
// =============================================================================

/// Shell snippet that records its pid in `pid_file` and then sleeps in place.
///
/// `exec` keeps the pid, so the recorded pid is the long-running process.
#[must_use]
pub fn record_pid_then_sleep(pid_file: &Path) -> String {
    let pid_file = pid_file.display();
    format!("echo $$ > '{pid_file}.tmp' && mv '{pid_file}.tmp' '{pid_file}'; exec sleep 60")
}

/// Wait up to `within` for a pid to appear in `path`.
pub async fn wait_for_pid_file(path: &Path, within: Duration) -> Option<u32> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if let Ok(text) = fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return Some(pid);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Whether `pid` names a live process. Zombies count as exited.
#[cfg(unix)]
#[must_use]
pub fn process_alive(pid: u32) -> bool {
    if let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) {
        // The state letter follows the parenthesized command name.
        return stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z'));
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Poll until `pid` exits; false if it is still alive after `within`.
#[cfg(unix)]
pub async fn wait_for_exit(pid: u32, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while process_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}
