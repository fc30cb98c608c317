//! Managed-backend strategies and their command lines.
//!
//! Two ways exist to reach the managed service: the compose orchestrator,
//! which knows every declared service of the project, and the plain docker
//! CLI addressing one container by name. This module only builds the
//! command lines; running them is [`crate::core::cli_runner`]'s job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::cli_runner::CommandSpec;
use crate::error::{ProxydashError, Result};
use crate::storage::config::Settings;

/// Which backend strategy produced a result.
///
/// Serialized as `process-group` and `single-container`; the short names
/// are accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// `docker compose`, the multi-service orchestrator.
    #[serde(rename = "process-group", alias = "compose")]
    Compose,
    /// `docker` addressing a single named container.
    #[serde(rename = "single-container", alias = "container")]
    Container,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compose => "process-group",
            Self::Container => "single-container",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to pick the backend for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Try compose first, fall back to the container CLI.
    #[default]
    Auto,
    /// Compose only.
    Compose,
    /// Container CLI only.
    Docker,
}

impl BackendMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Compose => "compose",
            Self::Docker => "docker",
        }
    }

    /// Strategies to attempt, in order.
    #[must_use]
    pub const fn attempts(self) -> &'static [BackendKind] {
        match self {
            Self::Auto => &[BackendKind::Compose, BackendKind::Container],
            Self::Compose => &[BackendKind::Compose],
            Self::Docker => &[BackendKind::Container],
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = ProxydashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "compose" | "docker-compose" => Ok(Self::Compose),
            "docker" | "container" => Ok(Self::Docker),
            other => Err(ProxydashError::ConfigInvalid {
                key: "backend".to_string(),
                message: format!("unknown backend '{other}' (expected auto, compose or docker)"),
            }),
        }
    }
}

/// Lifecycle verbs accepted by the action dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub const ALL: &'static [Self] = &[Self::Start, Self::Stop, Self::Restart];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = ProxydashError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ProxydashError::InvalidAction(s.to_string()))
    }
}

/// Builds backend command lines from the resolved settings.
#[derive(Debug, Clone, Copy)]
pub struct Backend<'a> {
    settings: &'a Settings,
}

impl<'a> Backend<'a> {
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    fn compose_base(&self) -> Vec<String> {
        let mut args = vec!["compose".to_string()];
        if let Some(file) = &self.settings.compose_file {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        args
    }

    fn spec(&self, args: Vec<String>) -> CommandSpec {
        CommandSpec::new(self.settings.docker_bin.clone(), args)
            .with_cwd(Some(self.settings.project_dir.clone()))
            .with_timeout(self.settings.command_timeout)
    }

    /// `docker compose ps --all --format json`.
    #[must_use]
    pub fn compose_ps(&self) -> CommandSpec {
        let mut args = self.compose_base();
        args.extend(["ps", "--all", "--format", "json"].map(String::from));
        self.spec(args)
    }

    /// `docker ps --all` filtered to exactly the configured container.
    #[must_use]
    pub fn container_ps(&self) -> CommandSpec {
        let filter = format!("name=^/{}$", self.settings.container_name);
        self.spec(vec![
            "ps".to_string(),
            "--all".to_string(),
            "--filter".to_string(),
            filter,
            "--format".to_string(),
            "{{json .}}".to_string(),
        ])
    }

    /// `docker inspect` of the container's state block.
    #[must_use]
    pub fn container_inspect(&self) -> CommandSpec {
        self.spec(vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .State}}".to_string(),
            self.settings.container_name.clone(),
        ])
    }

    /// Lifecycle action through the given backend.
    #[must_use]
    pub fn action(&self, kind: BackendKind, action: ServiceAction) -> CommandSpec {
        let args = match kind {
            BackendKind::Compose => {
                let mut args = self.compose_base();
                match action {
                    // `up -d` also creates a container that was never created.
                    ServiceAction::Start => args.extend(["up", "-d"].map(String::from)),
                    ServiceAction::Stop | ServiceAction::Restart => {
                        args.push(action.as_str().to_string());
                    }
                }
                args.push(self.settings.service_name.clone());
                args
            }
            BackendKind::Container => vec![
                action.as_str().to_string(),
                self.settings.container_name.clone(),
            ],
        };
        self.spec(args).with_timeout(self.settings.action_timeout)
    }

    /// Follow-mode log reader for `target`. Not subject to a timeout; the
    /// stream owns its lifetime.
    #[must_use]
    pub fn follow_logs(&self, kind: BackendKind, target: &str) -> CommandSpec {
        let tail = self.settings.log_tail.to_string();
        let args = match kind {
            BackendKind::Compose => {
                let mut args = self.compose_base();
                args.extend(["logs", "--follow", "--no-color", "--tail"].map(String::from));
                args.push(tail);
                args.push(target.to_string());
                args
            }
            BackendKind::Container => vec![
                "logs".to_string(),
                "--follow".to_string(),
                "--tail".to_string(),
                tail,
                target.to_string(),
            ],
        };
        CommandSpec::new(self.settings.docker_bin.clone(), args)
            .with_cwd(Some(self.settings.project_dir.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings() -> Settings {
        Settings {
            service_name: "cli-proxy-api".to_string(),
            container_name: "cli-proxy-api".to_string(),
            compose_file: Some(PathBuf::from("docker-compose.yml")),
            ..Settings::default()
        }
    }

    #[test]
    fn compose_ps_uses_json_format_and_file() {
        let settings = settings();
        let spec = Backend::new(&settings).compose_ps();
        assert_eq!(spec.program, "docker");
        assert_eq!(
            spec.args,
            ["compose", "-f", "docker-compose.yml", "ps", "--all", "--format", "json"]
        );
        assert_eq!(spec.cwd, Some(settings.project_dir.clone()));
    }

    #[test]
    fn container_ps_filters_exact_name() {
        let settings = settings();
        let spec = Backend::new(&settings).container_ps();
        assert!(spec.args.contains(&"name=^/cli-proxy-api$".to_string()));
    }

    #[test]
    fn compose_start_uses_up_detached() {
        let settings = settings();
        let spec = Backend::new(&settings).action(BackendKind::Compose, ServiceAction::Start);
        assert_eq!(spec.args[3..], ["up", "-d", "cli-proxy-api"]);
        assert_eq!(spec.timeout, settings.action_timeout);
    }

    #[test]
    fn container_restart_addresses_container() {
        let settings = settings();
        let spec = Backend::new(&settings).action(BackendKind::Container, ServiceAction::Restart);
        assert_eq!(spec.args, ["restart", "cli-proxy-api"]);
    }

    #[test]
    fn follow_logs_includes_tail_window() {
        let settings = settings();
        let spec = Backend::new(&settings).follow_logs(BackendKind::Container, "proxy");
        assert_eq!(spec.args, ["logs", "--follow", "--tail", "200", "proxy"]);
    }

    #[test]
    fn action_parsing_rejects_unknown_names() {
        assert_eq!("stop".parse::<ServiceAction>().unwrap(), ServiceAction::Stop);
        let err = "delete".parse::<ServiceAction>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn backend_mode_parsing() {
        assert_eq!("AUTO".parse::<BackendMode>().unwrap(), BackendMode::Auto);
        assert_eq!("container".parse::<BackendMode>().unwrap(), BackendMode::Docker);
        assert!("podman".parse::<BackendMode>().is_err());
        assert_eq!(BackendMode::Auto.attempts().len(), 2);
    }

    #[test]
    fn backend_kind_wire_labels() {
        assert_eq!(
            serde_json::to_value(BackendKind::Compose).unwrap(),
            "process-group"
        );
        assert_eq!(
            serde_json::to_value(BackendKind::Container).unwrap(),
            "single-container"
        );
        let short: BackendKind = serde_json::from_str("\"container\"").unwrap();
        assert_eq!(short, BackendKind::Container);
    }
}
