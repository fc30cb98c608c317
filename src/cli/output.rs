//! Text rendering for CLI reports.
//!
//! JSON output serializes the same structs the API returns; the human
//! format is a compact plain-text view of them.

use std::fmt::Write as _;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::core::actions::ActionReport;
use crate::core::credential_health::AuthReport;
use crate::core::diagnostics::DiagnosticsReport;
use crate::core::log_stream::{LogEvent, LogEventKind};
use crate::core::models::ModelCatalog;
use crate::core::service_state::StateSummary;
use crate::error::Result;
use crate::util::format_relative_time;

/// Serialize `value` as JSON, compact unless `pretty`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// Render a report in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    pretty: bool,
    human: impl FnOnce(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(value, pretty),
        OutputFormat::Human => Ok(human(value)),
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

#[must_use]
pub fn state(summary: &StateSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "State: {}  (backend {}, mode {})",
        summary.overall_state, summary.backend, summary.mode
    );
    if let Some(error) = &summary.error {
        let _ = writeln!(out, "Error: {error}");
    }
    if let Some(error) = &summary.fallback_error {
        let _ = writeln!(out, "Fallback: {error}");
    }
    if summary.timed_out {
        out.push_str("Backend call timed out\n");
    }
    for row in &summary.services {
        let details = row.details();
        let _ = writeln!(
            out,
            "  {:<24} {:<11} {:<24} {}",
            row.service(),
            row.discovered_state().to_string(),
            or_dash(row.container_name()),
            details.status_text
        );
    }
    out
}

#[must_use]
pub fn auth(report: &AuthReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Auth directory: {}", report.auth_dir);
    if let Some(error) = &report.dir_error {
        let _ = writeln!(out, "  {error}");
    }
    if let Some(error) = &report.config_error {
        let _ = writeln!(out, "Proxy config: {error}");
    }
    for provider in &report.providers {
        let _ = write!(
            out,
            "  {:<12} {:<10} {}",
            provider.provider.id(),
            provider.status.as_str(),
            provider.status_message
        );
        if let Some(expiry) = provider.soonest_expiry {
            let _ = write!(
                out,
                " (next expiry {})",
                format_relative_time(expiry, report.generated_at)
            );
        }
        out.push('\n');
    }
    out
}

#[must_use]
pub fn models(catalog: &ModelCatalog) -> String {
    let mut out = String::new();
    for (name, source) in [
        ("openai", &catalog.sources.openai),
        ("gemini", &catalog.sources.gemini),
    ] {
        match &source.error {
            Some(error) => {
                let _ = writeln!(out, "{name}: {error}");
            }
            None => {
                let _ = writeln!(out, "{name}: {} model(s)", source.model_count);
            }
        }
    }
    for group in &catalog.providers {
        let _ = writeln!(out, "{} ({})", group.provider, group.models.len());
        for model in &group.models {
            let sources: Vec<&str> = model.source_apis.iter().map(|s| s.as_str()).collect();
            let _ = writeln!(out, "  {:<40} [{}]", model.id, sources.join(", "));
        }
    }
    let _ = writeln!(out, "Total: {}", catalog.total_models);
    out
}

#[must_use]
pub fn diagnostics(report: &DiagnosticsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "proxydash {}", report.version);
    let _ = writeln!(
        out,
        "{}: {}",
        report.docker.program,
        report.docker.path.as_deref().unwrap_or("not found")
    );
    out.push('\n');
    out.push_str(&state(&report.state));
    out.push('\n');
    out.push_str(&auth(&report.auth));
    out.push('\n');
    out.push_str(&models(&report.models));
    out
}

#[must_use]
pub fn action(report: &ActionReport) -> String {
    let mut out = String::new();
    let verdict = if report.ok { "ok" } else { "failed" };
    let _ = writeln!(
        out,
        "{} via {}: {verdict} (exit {})",
        report.action, report.backend, report.exit_code
    );
    if let Some(reason) = &report.fallback_from {
        let _ = writeln!(out, "Fell back after: {reason}");
    }
    if let Some(error) = &report.error {
        let _ = writeln!(out, "Error: {error}");
    }
    out
}

/// One line per log event.
#[must_use]
pub fn log_line(event: &LogEvent) -> String {
    match event.kind {
        LogEventKind::Log => event.line.clone(),
        LogEventKind::Error => format!("! {}", event.line),
        LogEventKind::Status => format!("-- {}", event.line),
    }
}
