//! End-to-end tests for the proxydash binary.
//!
//! Every invocation points the settings file at a path that does not exist
//! so the developer's own configuration never leaks in.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

use proxydash::test_utils::{credential_json, expires_in_hours};

use common::fixtures::ProxyLayout;
use common::logger::TestLogger;

#[allow(deprecated)]
fn proxydash(layout: &ProxyLayout) -> Command {
    let mut cmd = Command::cargo_bin("proxydash").expect("binary built");
    cmd.env("PROXYDASH_CONFIG", layout.dir.file_path("absent.toml"))
        .env_remove("PROXYDASH_AUTH_DIR")
        .env_remove("PROXYDASH_API_BASE")
        .env_remove("PROXYDASH_API_KEY")
        .env_remove("RUST_LOG")
        .arg("--project-dir")
        .arg(layout.dir.path())
        .arg("--auth-dir")
        .arg(layout.dir.file_path("auths"))
        .arg("--proxy-config")
        .arg(layout.dir.file_path("config.yaml"));
    cmd
}

#[test]
fn help_lists_commands() {
    let log = TestLogger::new("help_lists_commands");
    let layout = ProxyLayout::new();
    proxydash(&layout)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("serve")
                .and(predicate::str::contains("diagnostics"))
                .and(predicate::str::contains("restart")),
        );
    log.finish_ok();
}

#[test]
fn version_flag_prints_version() {
    let log = TestLogger::new("version_flag_prints_version");
    let layout = ProxyLayout::new();
    proxydash(&layout)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    log.finish_ok();
}

#[test]
fn unknown_command_is_rejected() {
    let log = TestLogger::new("unknown_command_is_rejected");
    let layout = ProxyLayout::new();
    proxydash(&layout)
        .arg("explode")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("invalid")));
    log.finish_ok();
}

#[test]
fn auth_json_reports_expiring_token() {
    let log = TestLogger::new("auth_json_reports_expiring_token");
    log.phase("setup");
    let layout = ProxyLayout::new();
    layout.credential(
        "claude.json",
        &credential_json("claude", Some(expires_in_hours(10))),
    );

    log.phase("execute");
    let output = proxydash(&layout)
        .args(["auth", "--json"])
        .output()
        .expect("run proxydash");

    log.phase("verify");
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("auth json");
    let claude = report["providers"]
        .as_array()
        .expect("providers array")
        .iter()
        .find(|p| p["provider"] == "claude")
        .expect("claude entry");
    assert_eq!(claude["status"], "warning");
    assert_eq!(claude["expiringSoonCount"], 1);
    assert_eq!(claude["expiredCount"], 0);
    log.finish_ok();
}

#[test]
fn state_with_missing_cli_fails_with_unknown_state() {
    let log = TestLogger::new("state_with_missing_cli_fails_with_unknown_state");
    let layout = ProxyLayout::new();
    let output = proxydash(&layout)
        .args(["state", "--json", "--docker-bin"])
        .arg(layout.dir.file_path("no-docker-here"))
        .output()
        .expect("run proxydash");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("CLI tool not found"));
    let summary: Value = serde_json::from_slice(&output.stdout).expect("state json");
    assert_eq!(summary["overallState"], "unknown");
    assert_eq!(summary["dockerAvailable"], false);
    assert!(summary["error"].is_string());
    assert!(summary["fallbackError"].is_string());
    log.finish_ok();
}

#[test]
fn action_with_missing_cli_prints_report_then_exits_not_found() {
    let log = TestLogger::new("action_with_missing_cli_prints_report_then_exits_not_found");
    let layout = ProxyLayout::new();
    let output = proxydash(&layout)
        .args(["restart", "--json", "--docker-bin"])
        .arg(layout.dir.file_path("no-docker-here"))
        .output()
        .expect("run proxydash");

    assert_eq!(output.status.code(), Some(2));
    let report: Value = serde_json::from_slice(&output.stdout).expect("action json");
    assert_eq!(report["ok"], false);
    assert_eq!(report["action"], "restart");
    log.finish_ok();
}

#[test]
fn invalid_log_target_exits_with_input_error() {
    let log = TestLogger::new("invalid_log_target_exits_with_input_error");
    let layout = ProxyLayout::new();
    proxydash(&layout)
        .args(["logs", "bad/target"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("invalid log target"));
    log.finish_ok();
}

#[test]
fn invalid_settings_file_exits_with_input_error() {
    let log = TestLogger::new("invalid_settings_file_exits_with_input_error");
    let layout = ProxyLayout::new();
    layout.dir.create_file("broken.toml", "[service\nname = ");
    proxydash(&layout)
        .env("PROXYDASH_CONFIG", layout.dir.file_path("broken.toml"))
        .arg("auth")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("config parse error"));
    log.finish_ok();
}

#[test]
fn diagnostics_never_prints_the_api_key() {
    let log = TestLogger::new("diagnostics_never_prints_the_api_key");
    let layout = ProxyLayout::new();
    let output = proxydash(&layout)
        .args(["diagnostics", "--json", "--api-base", "http://127.0.0.1:9"])
        .args(["--api-key", "sk-very-secret", "--models-timeout", "2"])
        .args(["--docker-bin"])
        .arg(layout.dir.file_path("no-docker-here"))
        .output()
        .expect("run proxydash");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("sk-very-secret"));
    let report: Value = serde_json::from_str(&stdout).expect("diagnostics json");
    assert_eq!(report["settings"]["apiKeyConfigured"], true);
    assert_eq!(report["docker"]["found"], false);
    log.finish_ok();
}
