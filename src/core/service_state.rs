//! Runtime state of the managed service.
//!
//! The resolver asks the compose orchestrator first and, in `auto` mode,
//! falls back to the plain container CLI when compose is unavailable. Both
//! strategies produce the same [`ServiceState`] rows; the summary picks a
//! primary row and derives one overall state from it.
//!
//! Tool failures never surface as errors. They are recorded on the returned
//! [`StateSummary`] so callers always get a document to show.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::core::backend::{Backend, BackendKind, BackendMode};
use crate::core::cli_runner::{CommandOutcome, CommandRunner};
use crate::storage::config::Settings;

// =============================================================================
// Discovered State
// =============================================================================

/// Normalized container lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveredState {
    Running,
    Exited,
    Restarting,
    Created,
    /// The tool answered but knows no such service.
    NotCreated,
    Unknown,
}

impl DiscoveredState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Restarting => "restarting",
            Self::Created => "created",
            Self::NotCreated => "not-created",
            Self::Unknown => "unknown",
        }
    }

    fn from_explicit(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "exited" | "dead" => Some(Self::Exited),
            "restarting" => Some(Self::Restarting),
            "created" => Some(Self::Created),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type StatusRule = (fn(&str) -> bool, DiscoveredState);

fn reads_running(status: &str) -> bool {
    status.starts_with("up") || status.starts_with("running")
}

fn reads_exited(status: &str) -> bool {
    status.starts_with("exited") || status.contains("dead")
}

fn reads_restarting(status: &str) -> bool {
    status.contains("restart")
}

fn reads_created(status: &str) -> bool {
    status.contains("created")
}

/// Status-text rules over lower-cased text, first match wins.
const STATUS_RULES: &[StatusRule] = &[
    (reads_running, DiscoveredState::Running),
    (reads_exited, DiscoveredState::Exited),
    (reads_restarting, DiscoveredState::Restarting),
    (reads_created, DiscoveredState::Created),
];

/// Normalize an explicit state field, falling back to status text.
#[must_use]
pub fn normalize_state(explicit: Option<&str>, status_text: &str) -> DiscoveredState {
    if let Some(state) = explicit.and_then(DiscoveredState::from_explicit) {
        return state;
    }
    let lower = status_text.trim().to_lowercase();
    STATUS_RULES
        .iter()
        .find(|(matches, _)| matches(&lower))
        .map_or(DiscoveredState::Unknown, |(_, state)| *state)
}

// =============================================================================
// Service State
// =============================================================================

/// Descriptive fields reported by the backend as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowDetails {
    pub status_text: String,
    pub image_ref: Option<String>,
    pub created_at: Option<String>,
    pub running_for: Option<String>,
    pub exit_code: Option<i64>,
}

/// One service row as seen by one backend.
///
/// `running` and `exited` are derived from the discovered state when the
/// row is built and cannot be set on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    backend_kind: BackendKind,
    service: String,
    container_name: Option<String>,
    discovered_state: DiscoveredState,
    #[serde(flatten)]
    details: RowDetails,
    running: bool,
    exited: bool,
}

impl ServiceState {
    #[must_use]
    pub fn new(
        backend_kind: BackendKind,
        service: impl Into<String>,
        container_name: Option<String>,
        discovered_state: DiscoveredState,
        details: RowDetails,
    ) -> Self {
        Self {
            backend_kind,
            service: service.into(),
            container_name,
            discovered_state,
            details,
            running: discovered_state == DiscoveredState::Running,
            exited: discovered_state == DiscoveredState::Exited,
        }
    }

    /// Placeholder row for a service the backend does not know.
    #[must_use]
    pub fn not_created(backend_kind: BackendKind, settings: &Settings) -> Self {
        Self::new(
            backend_kind,
            settings.service_name.clone(),
            Some(settings.container_name.clone()),
            DiscoveredState::NotCreated,
            RowDetails {
                status_text: "not created".to_string(),
                ..RowDetails::default()
            },
        )
    }

    #[must_use]
    pub const fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    #[must_use]
    pub const fn discovered_state(&self) -> DiscoveredState {
        self.discovered_state
    }

    #[must_use]
    pub const fn details(&self) -> &RowDetails {
        &self.details
    }

    #[must_use]
    pub const fn running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub const fn exited(&self) -> bool {
        self.exited
    }

    fn matches(&self, settings: &Settings) -> bool {
        self.service == settings.service_name
            || self.container_name.as_deref() == Some(settings.container_name.as_str())
    }
}

// =============================================================================
// Output Parsing
// =============================================================================

/// Split `ps` output into JSON objects.
///
/// Accepts a JSON array, a single object, or one object per line.
///
/// # Errors
///
/// Returns the first parse error.
pub fn parse_json_records(stdout: &str) -> std::result::Result<Vec<Value>, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<Value>>(trimmed).map_err(|e| e.to_string());
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(vec![value]);
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str::<Value>(line).map_err(|e| e.to_string()))
        .collect()
}

fn text(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn integer(record: &Value, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn details_of(record: &Value) -> RowDetails {
    RowDetails {
        status_text: text(record, "Status").unwrap_or_default(),
        image_ref: text(record, "Image"),
        created_at: text(record, "CreatedAt"),
        running_for: text(record, "RunningFor"),
        exit_code: integer(record, "ExitCode"),
    }
}

/// Rows from `docker compose ps --format json`.
#[must_use]
pub fn compose_rows(records: &[Value]) -> Vec<ServiceState> {
    records
        .iter()
        .filter(|record| record.is_object())
        .map(|record| {
            let details = details_of(record);
            let name = text(record, "Name");
            let service = text(record, "Service")
                .or_else(|| name.clone())
                .unwrap_or_default();
            let state = normalize_state(text(record, "State").as_deref(), &details.status_text);
            ServiceState::new(BackendKind::Compose, service, name, state, details)
        })
        .collect()
}

/// Compose service label from `docker ps`'s comma-joined `Labels` field.
fn compose_service_label(labels: &str) -> Option<String> {
    labels
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == "com.docker.compose.service")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Rows from `docker ps --format {{json .}}`.
#[must_use]
pub fn container_rows(records: &[Value]) -> Vec<ServiceState> {
    records
        .iter()
        .filter(|record| record.is_object())
        .map(|record| {
            let details = details_of(record);
            let name = text(record, "Names")
                .and_then(|names| names.split(',').next().map(|n| n.trim().to_string()));
            let service = text(record, "Labels")
                .and_then(|labels| compose_service_label(&labels))
                .or_else(|| name.clone())
                .unwrap_or_default();
            let state = normalize_state(text(record, "State").as_deref(), &details.status_text);
            ServiceState::new(BackendKind::Container, service, name, state, details)
        })
        .collect()
}

/// Overlay `docker inspect --format {{json .State}}` output onto a row.
///
/// Output that does not parse leaves the row unchanged.
#[must_use]
pub fn apply_inspect(row: ServiceState, inspect_stdout: &str) -> ServiceState {
    let Ok(state @ Value::Object(_)) = serde_json::from_str::<Value>(inspect_stdout.trim()) else {
        return row;
    };

    let restarting = state.get("Restarting").and_then(Value::as_bool) == Some(true);
    let running = state.get("Running").and_then(Value::as_bool);
    let explicit = if restarting {
        Some("restarting".to_string())
    } else {
        text(&state, "Status").or_else(|| running.filter(|r| *r).map(|_| "running".to_string()))
    };

    let mut details = row.details;
    if let Some(code) = integer(&state, "ExitCode") {
        details.exit_code = Some(code);
    }
    let discovered = normalize_state(explicit.as_deref(), &details.status_text);
    ServiceState::new(
        row.backend_kind,
        row.service,
        row.container_name,
        discovered,
        details,
    )
}

// =============================================================================
// Summary
// =============================================================================

/// Resolver output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    /// Backend whose answer is reported.
    pub backend: BackendKind,
    pub mode: BackendMode,
    /// The reported backend's tool call succeeded.
    pub docker_available: bool,
    pub overall_state: DiscoveredState,
    pub primary: Option<ServiceState>,
    pub services: Vec<ServiceState>,
    pub error: Option<String>,
    /// Error of the other strategy, when one was tried.
    pub fallback_error: Option<String>,
    pub timed_out: bool,
    pub generated_at: DateTime<Utc>,
}

impl StateSummary {
    /// True if the primary service is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.overall_state == DiscoveredState::Running
    }
}

/// Result of a single strategy.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub kind: BackendKind,
    pub rows: std::result::Result<Vec<ServiceState>, String>,
    pub timed_out: bool,
}

impl Attempt {
    fn failed(kind: BackendKind, outcome: &CommandOutcome) -> Self {
        Self {
            kind,
            rows: Err(outcome.error_message()),
            timed_out: outcome.timed_out,
        }
    }

    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.rows.is_ok()
    }

    fn error(&self) -> Option<String> {
        self.rows.as_ref().err().cloned()
    }
}

/// Pick the primary row: the configured service, else the first row.
#[must_use]
pub fn select_primary<'a>(
    rows: &'a [ServiceState],
    settings: &Settings,
) -> Option<&'a ServiceState> {
    rows.iter().find(|row| row.matches(settings)).or_else(|| rows.first())
}

/// Build the summary for a finished attempt.
#[must_use]
pub fn summarize(
    attempt: Attempt,
    mode: BackendMode,
    fallback_error: Option<String>,
    settings: &Settings,
) -> StateSummary {
    let error = attempt.error();
    let docker_available = attempt.succeeded();
    let services = match attempt.rows {
        Ok(rows) if rows.is_empty() => vec![ServiceState::not_created(attempt.kind, settings)],
        Ok(rows) => rows,
        Err(_) => Vec::new(),
    };
    let primary = select_primary(&services, settings).cloned();
    let overall_state = primary
        .as_ref()
        .map_or(DiscoveredState::Unknown, ServiceState::discovered_state);

    StateSummary {
        backend: attempt.kind,
        mode,
        docker_available,
        overall_state,
        primary,
        services,
        error,
        fallback_error,
        timed_out: attempt.timed_out,
        generated_at: Utc::now(),
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves service state through a [`CommandRunner`].
pub struct StateResolver<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
}

impl<'a> StateResolver<'a> {
    #[must_use]
    pub const fn new(settings: &'a Settings, runner: &'a dyn CommandRunner) -> Self {
        Self { settings, runner }
    }

    /// Resolve using the configured backend mode.
    pub async fn resolve(&self) -> StateSummary {
        self.resolve_with_mode(self.settings.backend_mode).await
    }

    /// Resolve using an explicit backend mode.
    pub async fn resolve_with_mode(&self, mode: BackendMode) -> StateSummary {
        let mut failures: Vec<Attempt> = Vec::new();

        for kind in mode.attempts() {
            let attempt = self.attempt(*kind).await;
            if attempt.succeeded() {
                let fallback_error = failures.first().and_then(Attempt::error);
                return summarize(attempt, mode, fallback_error, self.settings);
            }
            tracing::debug!(
                backend = %kind,
                error = attempt.error().unwrap_or_default(),
                "state strategy failed"
            );
            failures.push(attempt);
        }

        let mut failures = failures.into_iter();
        let Some(first) = failures.next() else {
            return summarize(
                Attempt {
                    kind: BackendKind::Compose,
                    rows: Err("no backend strategy configured".to_string()),
                    timed_out: false,
                },
                mode,
                None,
                self.settings,
            );
        };
        let fallback_error = failures.next().and_then(|attempt| attempt.error());
        tracing::warn!(
            mode = %mode,
            error = first.error().unwrap_or_default(),
            "cannot resolve service state"
        );
        summarize(first, mode, fallback_error, self.settings)
    }

    /// Run one strategy.
    pub async fn attempt(&self, kind: BackendKind) -> Attempt {
        match kind {
            BackendKind::Compose => self.via_compose().await,
            BackendKind::Container => self.via_container().await,
        }
    }

    async fn via_compose(&self) -> Attempt {
        let backend = Backend::new(self.settings);
        let outcome = self.runner.run(&backend.compose_ps()).await;
        if !outcome.success() {
            return Attempt::failed(BackendKind::Compose, &outcome);
        }
        let rows = parse_json_records(&outcome.stdout)
            .map(|records| compose_rows(&records))
            .map_err(|e| format!("cannot parse compose output: {e}"));
        Attempt {
            kind: BackendKind::Compose,
            rows,
            timed_out: false,
        }
    }

    async fn via_container(&self) -> Attempt {
        let backend = Backend::new(self.settings);
        let outcome = self.runner.run(&backend.container_ps()).await;
        if !outcome.success() {
            return Attempt::failed(BackendKind::Container, &outcome);
        }
        let rows = match parse_json_records(&outcome.stdout) {
            Ok(records) => container_rows(&records),
            Err(e) => {
                return Attempt {
                    kind: BackendKind::Container,
                    rows: Err(format!("cannot parse docker output: {e}")),
                    timed_out: false,
                };
            }
        };

        let rows = if rows.is_empty() {
            rows
        } else {
            let inspect = self.runner.run(&backend.container_inspect()).await;
            if inspect.success() {
                rows.into_iter()
                    .map(|row| apply_inspect(row, &inspect.stdout))
                    .collect()
            } else {
                tracing::debug!(
                    error = inspect.error_message(),
                    "inspect failed, keeping ps state"
                );
                rows
            }
        };

        Attempt {
            kind: BackendKind::Container,
            rows: Ok(rows),
            timed_out: false,
        }
    }
}
