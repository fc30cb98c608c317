//! Aggregated diagnostics document.
//!
//! Runs the state, auth and model checks concurrently. Each part reports its
//! own failures, so one broken subsystem never hides the others.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::backend::BackendMode;
use crate::core::cli_runner::CommandRunner;
use crate::core::credential_health::{self, AuthReport};
use crate::core::models::{self, ModelCatalog};
use crate::core::service_state::{StateResolver, StateSummary};
use crate::storage::config::Settings;

/// Location of the container CLI on this host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub program: String,
    pub path: Option<String>,
    pub found: bool,
}

impl ToolInfo {
    #[must_use]
    pub fn locate(program: &str) -> Self {
        let path = which::which(program).ok();
        Self {
            program: program.to_string(),
            found: path.is_some(),
            path: path.map(|p| p.display().to_string()),
        }
    }
}

/// Effective settings, without secrets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub backend_mode: BackendMode,
    pub project_dir: String,
    pub compose_file: Option<String>,
    pub service_name: String,
    pub container_name: String,
    pub auth_dir: String,
    pub proxy_config_path: String,
    pub api_base_url: String,
    pub api_key_configured: bool,
    pub bind: String,
    pub allow_remote: bool,
}

impl From<&Settings> for SettingsView {
    fn from(settings: &Settings) -> Self {
        Self {
            backend_mode: settings.backend_mode,
            project_dir: settings.project_dir.display().to_string(),
            compose_file: settings
                .compose_file
                .as_ref()
                .map(|p| p.display().to_string()),
            service_name: settings.service_name.clone(),
            container_name: settings.container_name.clone(),
            auth_dir: settings.auth_dir.display().to_string(),
            proxy_config_path: settings.proxy_config_path.display().to_string(),
            api_base_url: settings.api_base_url.clone(),
            api_key_configured: settings.api_key.is_some(),
            bind: settings.bind.to_string(),
            allow_remote: settings.allow_remote,
        }
    }
}

/// Everything the dashboard knows, in one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub settings: SettingsView,
    pub docker: ToolInfo,
    pub state: StateSummary,
    pub auth: AuthReport,
    pub models: ModelCatalog,
}

/// Collect the full report.
pub async fn collect(settings: &Settings, runner: &dyn CommandRunner) -> DiagnosticsReport {
    let now = Utc::now();
    let resolver = StateResolver::new(settings, runner);
    let (state, auth, models) = tokio::join!(
        resolver.resolve(),
        credential_health::evaluate(settings, now),
        models::fetch_catalog(settings),
    );

    DiagnosticsReport {
        version: env!("CARGO_PKG_VERSION"),
        generated_at: now,
        settings: SettingsView::from(settings),
        docker: ToolInfo::locate(&settings.docker_bin),
        state,
        auth,
        models,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedRunner, TestDir, settings_in};

    #[test]
    fn settings_view_hides_api_key() {
        let settings = Settings {
            api_key: Some("sk-secret".to_string()),
            ..Settings::default()
        };
        let json = serde_json::to_string(&SettingsView::from(&settings)).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("\"apiKeyConfigured\":true"));
    }

    #[test]
    fn missing_tool_is_reported_not_found() {
        let info = ToolInfo::locate("proxydash-test-no-such-binary");
        assert!(!info.found);
        assert!(info.path.is_none());
    }

    #[tokio::test]
    async fn partial_failures_do_not_abort_the_report() {
        let dir = TestDir::new();
        let settings = Settings {
            // Nothing listens here; both listings fail fast.
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..settings_in(dir.path())
        };
        let runner = ScriptedRunner::new();
        let report = collect(&settings, &runner).await;

        assert!(!report.state.docker_available);
        assert!(report.auth.dir_error.is_some());
        assert!(!report.models.sources.openai.ok);
        assert!(!report.models.sources.gemini.ok);
    }
}
