//! Integration tests for state resolution, lifecycle actions and log
//! streaming.
//!
//! Scripted runners cover backend fallback. A shell script standing in for
//! the container CLI covers the real process path on Unix.

mod common;

use proxydash::core::actions::ActionDispatcher;
use proxydash::core::backend::{BackendKind, BackendMode};
use proxydash::core::service_state::{DiscoveredState, StateResolver};
use proxydash::test_utils::{
    ScriptedRunner, compose_ps_json, container_ps_json, failed, succeeded, timed_out,
};

use common::fixtures::ProxyLayout;
use common::logger::TestLogger;

#[tokio::test]
async fn compose_answer_is_used_when_available() {
    let log = TestLogger::new("compose_answer_is_used_when_available");
    log.phase("setup");
    let layout = ProxyLayout::new();
    let settings = layout.settings();
    let runner = ScriptedRunner::new().on(
        &["compose", "ps"],
        succeeded(&compose_ps_json("cli-proxy-api", "running", "Up 2 hours")),
    );

    log.phase("execute");
    let summary = StateResolver::new(&settings, &runner).resolve().await;

    log.phase("verify");
    assert_eq!(summary.backend, BackendKind::Compose);
    assert_eq!(summary.overall_state, DiscoveredState::Running);
    assert!(summary.docker_available);
    assert!(summary.error.is_none());
    assert!(summary.fallback_error.is_none());
    assert_eq!(runner.calls().len(), 1);
    log.finish_ok();
}

#[tokio::test]
async fn compose_failure_falls_back_to_container_cli() {
    let log = TestLogger::new("compose_failure_falls_back_to_container_cli");
    log.phase("setup");
    let layout = ProxyLayout::new();
    let settings = layout.settings();
    let runner = ScriptedRunner::new()
        .on(&["compose"], failed(1, "no configuration file provided: not found"))
        .on(
            &["ps"],
            succeeded(&container_ps_json("cli-proxy-api", "exited", "Exited (1) 3 minutes ago")),
        )
        .on(&["inspect"], succeeded(r#"{"Status":"exited","ExitCode":1}"#));

    log.phase("execute");
    let auto = StateResolver::new(&settings, &runner).resolve().await;
    let direct = StateResolver::new(&settings, &runner)
        .resolve_with_mode(BackendMode::Docker)
        .await;

    log.phase("verify");
    assert_eq!(auto.backend, BackendKind::Container);
    assert_eq!(auto.overall_state, DiscoveredState::Exited);
    assert_eq!(
        auto.fallback_error.as_deref(),
        Some("no configuration file provided: not found")
    );
    assert_eq!(auto.overall_state, direct.overall_state);
    assert_eq!(auto.services, direct.services);
    assert_eq!(auto.primary, direct.primary);
    assert!(direct.fallback_error.is_none());
    let primary = auto.primary.expect("primary row");
    assert_eq!(primary.details().exit_code, Some(1));
    log.finish_ok();
}

#[tokio::test]
async fn running_container_is_found_when_compose_is_missing() {
    let log = TestLogger::new("running_container_is_found_when_compose_is_missing");
    let layout = ProxyLayout::new();
    let settings = layout.settings();
    let runner = ScriptedRunner::new()
        .on(&["compose"], failed(125, "docker: 'compose' is not a docker command."))
        .on(
            &["ps"],
            succeeded(&container_ps_json("cli-proxy-api", "running", "Up 4 days")),
        )
        .on(&["inspect"], succeeded(r#"{"Status":"running","Running":true,"ExitCode":0}"#));

    let summary = StateResolver::new(&settings, &runner).resolve().await;

    assert!(summary.docker_available);
    assert_eq!(summary.backend, BackendKind::Container);
    assert_eq!(summary.overall_state, DiscoveredState::Running);
    assert!(summary.is_running());
    log.finish_ok();
}

#[tokio::test]
async fn both_backends_failing_reports_unknown() {
    let log = TestLogger::new("both_backends_failing_reports_unknown");
    let layout = ProxyLayout::new();
    let settings = layout.settings();
    let runner = ScriptedRunner::new()
        .on(&["compose"], timed_out())
        .on(&["ps"], failed(1, "Cannot connect to the Docker daemon"));

    let summary = StateResolver::new(&settings, &runner).resolve().await;

    assert_eq!(summary.backend, BackendKind::Compose);
    assert_eq!(summary.overall_state, DiscoveredState::Unknown);
    assert!(!summary.docker_available);
    assert!(summary.timed_out);
    assert!(summary.services.is_empty());
    assert!(summary.primary.is_none());
    assert_eq!(
        summary.fallback_error.as_deref(),
        Some("Cannot connect to the Docker daemon")
    );
    log.finish_ok();
}

#[tokio::test]
async fn absent_service_is_not_created() {
    let log = TestLogger::new("absent_service_is_not_created");
    let layout = ProxyLayout::new();
    let settings = layout.settings();
    let runner = ScriptedRunner::new().on(&["compose", "ps"], succeeded("[]"));

    let summary = StateResolver::new(&settings, &runner).resolve().await;

    assert_eq!(summary.overall_state, DiscoveredState::NotCreated);
    assert_eq!(summary.services.len(), 1);
    assert_eq!(summary.services[0].service(), "cli-proxy-api");
    log.finish_ok();
}

#[tokio::test]
async fn restart_falls_back_and_records_first_failure() {
    let log = TestLogger::new("restart_falls_back_and_records_first_failure");
    log.phase("setup");
    let layout = ProxyLayout::new();
    let settings = layout.settings();
    let runner = ScriptedRunner::new()
        .on(&["compose"], failed(1, "compose is not a docker command"))
        .on(&["restart", "cli-proxy-api"], succeeded("cli-proxy-api\n"));

    log.phase("execute");
    let report = ActionDispatcher::new(&settings, &runner)
        .dispatch("restart")
        .await
        .expect("valid action");

    log.phase("verify");
    assert!(report.ok);
    assert_eq!(report.backend, BackendKind::Container);
    assert_eq!(
        report.fallback_from.as_deref(),
        Some("compose is not a docker command")
    );
    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].args, vec!["restart", "cli-proxy-api"]);
    log.finish_ok();
}

#[tokio::test]
async fn failed_stop_reports_last_error() {
    let log = TestLogger::new("failed_stop_reports_last_error");
    let layout = ProxyLayout::new();
    let settings = layout.settings();
    let runner = ScriptedRunner::new()
        .on(&["compose"], failed(1, "compose broke"))
        .on(&["stop"], failed(1, "No such container: cli-proxy-api"));

    let report = ActionDispatcher::new(&settings, &runner)
        .dispatch("stop")
        .await
        .expect("valid action");

    assert!(!report.ok);
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.error.as_deref(), Some("No such container: cli-proxy-api"));
    assert_eq!(report.fallback_from.as_deref(), Some("compose broke"));
    log.finish_ok();
}

#[cfg(unix)]
mod with_fake_cli {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    use futures::StreamExt;

    use proxydash::core::cli_runner::TokioCommandRunner;
    use proxydash::core::log_stream::{self, LogEventKind, StreamItem};
    use proxydash::core::service_state::{DiscoveredState, StateResolver};
    use proxydash::storage::config::Settings;

    use super::common::fixtures::ProxyLayout;
    use super::common::logger::TestLogger;

    /// Install an executable script answering like the container CLI.
    fn install_fake_cli(layout: &ProxyLayout) -> Settings {
        let script = r#"#!/bin/sh
case "$1 $2" in
  "compose ps")
    echo '[{"Service":"cli-proxy-api","Name":"cli-proxy-api-1","State":"running","Status":"Up 5 minutes"}]'
    ;;
  "compose logs")
    echo "server listening on :8317"
    echo "token refreshed" 1>&2
    exit 0
    ;;
  *)
    echo "unexpected: $*" 1>&2
    exit 1
    ;;
esac
"#;
        layout.dir.create_file("fake-docker", script);
        let path = layout.dir.file_path("fake-docker");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");

        Settings {
            docker_bin: path.display().to_string(),
            heartbeat_interval: Duration::from_secs(30),
            ..layout.settings()
        }
    }

    #[tokio::test]
    async fn resolves_state_through_a_real_process() {
        let log = TestLogger::new("resolves_state_through_a_real_process");
        let layout = ProxyLayout::new();
        let settings = install_fake_cli(&layout);

        let summary = StateResolver::new(&settings, &TokioCommandRunner).resolve().await;

        assert_eq!(summary.overall_state, DiscoveredState::Running);
        assert!(summary.docker_available);
        log.finish_ok();
    }

    #[tokio::test]
    async fn streams_logs_until_the_process_exits() {
        let log = TestLogger::new("streams_logs_until_the_process_exits");
        log.phase("setup");
        let layout = ProxyLayout::new();
        let settings = install_fake_cli(&layout);

        log.phase("execute");
        let stream = log_stream::open(&settings, &TokioCommandRunner, "cli-proxy-api")
            .await
            .expect("valid target");
        let collected = stream.collect::<Vec<_>>();
        let events: Vec<_> = tokio::time::timeout(Duration::from_secs(10), collected)
            .await
            .expect("stream ends")
            .into_iter()
            .filter_map(|item| match item {
                StreamItem::Event(event) => Some(event),
                StreamItem::Heartbeat => None,
            })
            .collect();

        log.phase("verify");
        let saw = |kind: LogEventKind, line: &str| {
            events.iter().any(|e| e.kind == kind && e.line == line)
        };
        assert!(saw(LogEventKind::Log, "server listening on :8317"));
        assert!(saw(LogEventKind::Error, "token refreshed"));
        let last = events.last().expect("status event");
        assert_eq!(last.kind, LogEventKind::Status);
        assert_eq!(last.exit_code, Some(0));
        log.finish_ok();
    }
}
