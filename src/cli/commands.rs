//! Command implementations.
//!
//! Each command builds the same report the API serves and prints it. The
//! returned exit code reflects the operation's own outcome; errors are
//! reserved for requests that could not be carried out at all.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;

use crate::cli::args::OutputFormat;
use crate::cli::output;
use crate::core::actions::ActionDispatcher;
use crate::core::cli_runner::CommandRunner;
use crate::core::credential_health;
use crate::core::diagnostics;
use crate::core::log_stream::{self, LogEventKind, StreamItem, StreamState};
use crate::core::models;
use crate::core::service_state::StateResolver;
use crate::error::{ExitCode, ProxydashError, Result};
use crate::server;
use crate::storage::config::Settings;

/// Output options shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl Output {
    fn print<T: serde::Serialize>(self, value: &T, human: impl FnOnce(&T) -> String) -> Result<()> {
        let text = output::render(value, self.format, self.pretty, human)?;
        if self.format == OutputFormat::Json {
            println!("{text}");
        } else {
            print!("{text}");
        }
        Ok(())
    }
}

/// Exit status for a backend call that did not succeed.
///
/// A timeout or a missing backend CLI surfaces as its own error so the
/// process exits with the matching code; anything else is a plain failure.
fn backend_failure(docker_bin: &str, timed_out: bool, timeout: Duration) -> Result<ExitCode> {
    if timed_out {
        return Err(ProxydashError::Timeout(timeout.as_secs()));
    }
    if which::which(docker_bin).is_err() {
        return Err(ProxydashError::CliNotFound {
            name: docker_bin.to_string(),
        });
    }
    Ok(ExitCode::GeneralError)
}

/// Run the diagnostics API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn serve(settings: Arc<Settings>, runner: Arc<dyn CommandRunner>) -> Result<ExitCode> {
    server::run(settings, runner).await?;
    Ok(ExitCode::Success)
}

/// Print the resolved service state. Exits non-zero if the backend failed.
///
/// # Errors
///
/// Returns an error if output cannot be serialized, or after printing when
/// the backend CLI is missing or timed out.
pub async fn state(
    settings: &Settings,
    runner: &dyn CommandRunner,
    out: Output,
) -> Result<ExitCode> {
    let summary = StateResolver::new(settings, runner).resolve().await;
    out.print(&summary, output::state)?;
    if summary.error.is_none() {
        return Ok(ExitCode::Success);
    }
    backend_failure(&settings.docker_bin, summary.timed_out, settings.command_timeout)
}

/// Print credential health.
///
/// # Errors
///
/// Returns an error if output cannot be serialized.
pub async fn auth(settings: &Settings, out: Output) -> Result<ExitCode> {
    let report = credential_health::evaluate(settings, Utc::now()).await;
    out.print(&report, output::auth)?;
    Ok(ExitCode::Success)
}

/// Print the model catalog. Exits non-zero if both listings failed.
///
/// # Errors
///
/// Returns an error if output cannot be serialized.
pub async fn models(settings: &Settings, out: Output) -> Result<ExitCode> {
    let catalog = models::fetch_catalog(settings).await;
    out.print(&catalog, output::models)?;
    let sources = &catalog.sources;
    Ok(if sources.openai.ok || sources.gemini.ok {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    })
}

/// Print the full diagnostics report.
///
/// # Errors
///
/// Returns an error if output cannot be serialized.
pub async fn diagnostics(
    settings: &Settings,
    runner: &dyn CommandRunner,
    out: Output,
) -> Result<ExitCode> {
    let report = diagnostics::collect(settings, runner).await;
    out.print(&report, output::diagnostics)?;
    Ok(ExitCode::Success)
}

/// Run a lifecycle action. Exits non-zero if the action failed.
///
/// # Errors
///
/// Returns [`ProxydashError::InvalidAction`] for unknown names, and
/// [`ProxydashError::CliNotFound`] or [`ProxydashError::Timeout`] after
/// printing a failed report.
pub async fn action(
    settings: &Settings,
    runner: &dyn CommandRunner,
    name: &str,
    out: Output,
) -> Result<ExitCode> {
    let report = ActionDispatcher::new(settings, runner).dispatch(name).await?;
    out.print(&report, output::action)?;
    if report.ok {
        return Ok(ExitCode::Success);
    }
    backend_failure(&settings.docker_bin, report.timed_out, settings.action_timeout)
}

/// Follow logs until the process exits or Ctrl-C.
///
/// JSON output writes one event per line.
///
/// # Errors
///
/// Returns [`ProxydashError::InvalidTarget`] for bad targets, and
/// [`ProxydashError::CliNotFound`] when the follow process cannot start.
pub async fn logs(
    settings: &Settings,
    runner: &dyn CommandRunner,
    target: Option<&str>,
    out: Output,
) -> Result<ExitCode> {
    let target = target.unwrap_or(&settings.service_name);
    let mut stream = log_stream::open(settings, runner, target).await?;
    let mut exit = ExitCode::Success;

    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("log follow interrupted");
                break;
            }
        };
        let Some(item) = item else { break };
        let StreamItem::Event(event) = item else {
            continue;
        };
        if event.kind == LogEventKind::Status && event.exit_code != Some(0) {
            exit = ExitCode::GeneralError;
        }
        match out.format {
            OutputFormat::Json => println!("{}", output::to_json(&event, false)?),
            OutputFormat::Human => println!("{}", output::log_line(&event)),
        }
    }
    if stream.state() == StreamState::ClosedError {
        return backend_failure(&settings.docker_bin, false, Duration::ZERO);
    }
    Ok(exit)
}
