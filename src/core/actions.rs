//! Lifecycle actions (start, stop, restart) on the managed service.

use serde::Serialize;

use crate::core::backend::{Backend, BackendKind, BackendMode, ServiceAction};
use crate::core::cli_runner::{CommandOutcome, CommandRunner};
use crate::error::Result;
use crate::storage::config::Settings;

/// Result of one dispatched action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    pub ok: bool,
    pub action: ServiceAction,
    /// Backend that ran the final attempt.
    pub backend: BackendKind,
    pub exit_code: i32,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    /// Failure message of the first backend when a fallback ran.
    pub fallback_from: Option<String>,
}

impl ActionReport {
    fn from_outcome(action: ServiceAction, backend: BackendKind, outcome: CommandOutcome) -> Self {
        let ok = outcome.success();
        let error = (!ok).then(|| outcome.error_message());
        Self {
            ok,
            action,
            backend,
            exit_code: outcome.exit_code,
            timed_out: outcome.timed_out,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            error,
            fallback_from: None,
        }
    }
}

/// Runs lifecycle actions through the configured backend mode.
pub struct ActionDispatcher<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
}

impl<'a> ActionDispatcher<'a> {
    #[must_use]
    pub const fn new(settings: &'a Settings, runner: &'a dyn CommandRunner) -> Self {
        Self { settings, runner }
    }

    /// Validate an action name, then run it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ProxydashError::InvalidAction`] for unknown
    /// names; no command is run in that case.
    pub async fn dispatch(&self, name: &str) -> Result<ActionReport> {
        let action: ServiceAction = name.parse()?;
        Ok(self.run(action).await)
    }

    /// Run `action` using the configured backend mode.
    pub async fn run(&self, action: ServiceAction) -> ActionReport {
        self.run_with_mode(action, self.settings.backend_mode).await
    }

    /// Run `action` with an explicit backend mode.
    pub async fn run_with_mode(&self, action: ServiceAction, mode: BackendMode) -> ActionReport {
        let backend = Backend::new(self.settings);
        let mut fallback_from: Option<String> = None;
        let mut report: Option<ActionReport> = None;

        for kind in mode.attempts() {
            let spec = backend.action(*kind, action);
            tracing::info!(
                action = %action,
                backend = %kind,
                command = %spec.display(),
                "running action"
            );
            let outcome = self.runner.run(&spec).await;
            let mut attempt = ActionReport::from_outcome(action, *kind, outcome);
            attempt.fallback_from.clone_from(&fallback_from);

            if attempt.ok {
                return attempt;
            }
            tracing::warn!(
                action = %action,
                backend = %kind,
                error = attempt.error.as_deref().unwrap_or_default(),
                "action failed"
            );
            if fallback_from.is_none() {
                fallback_from.clone_from(&attempt.error);
            }
            report = Some(attempt);
        }

        report.unwrap_or_else(|| {
            ActionReport::from_outcome(
                action,
                BackendKind::Compose,
                CommandOutcome::spawn_failure("no backend strategy configured"),
            )
        })
    }
}
