//! Settings loading and resolution.
//!
//! Settings are read once at startup into an immutable [`Settings`] value
//! that every component receives by reference. Nothing below this module
//! reads the environment.
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Settings file (`~/.config/proxydash/config.toml`, or `PROXYDASH_CONFIG`)
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `PROXYDASH_CONFIG`: Override settings file path
//! - `PROXYDASH_PROJECT_DIR`, `PROXYDASH_COMPOSE_FILE`: Compose project location
//! - `PROXYDASH_SERVICE`, `PROXYDASH_CONTAINER`: Managed service and container names
//! - `PROXYDASH_BACKEND`: `auto`, `compose` or `docker`
//! - `PROXYDASH_DOCKER_BIN`: Container CLI program
//! - `PROXYDASH_AUTH_DIR`, `PROXYDASH_PROXY_CONFIG`: Credential directory and proxy YAML
//! - `PROXYDASH_API_BASE`, `PROXYDASH_API_KEY`: Upstream listing API
//! - `PROXYDASH_BIND`, `PROXYDASH_ALLOW_REMOTE`: Diagnostics listener
//! - `PROXYDASH_TIMEOUT`, `PROXYDASH_MODELS_TIMEOUT`: Timeouts in seconds
//! - `PROXYDASH_LOG_TAIL`, `PROXYDASH_HEARTBEAT`: Log stream tuning

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::core::backend::BackendMode;
use crate::error::{ProxydashError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

pub const ENV_CONFIG: &str = "PROXYDASH_CONFIG";
pub const ENV_PROJECT_DIR: &str = "PROXYDASH_PROJECT_DIR";
pub const ENV_COMPOSE_FILE: &str = "PROXYDASH_COMPOSE_FILE";
pub const ENV_SERVICE: &str = "PROXYDASH_SERVICE";
pub const ENV_CONTAINER: &str = "PROXYDASH_CONTAINER";
pub const ENV_BACKEND: &str = "PROXYDASH_BACKEND";
pub const ENV_DOCKER_BIN: &str = "PROXYDASH_DOCKER_BIN";
pub const ENV_AUTH_DIR: &str = "PROXYDASH_AUTH_DIR";
pub const ENV_PROXY_CONFIG: &str = "PROXYDASH_PROXY_CONFIG";
pub const ENV_API_BASE: &str = "PROXYDASH_API_BASE";
pub const ENV_API_KEY: &str = "PROXYDASH_API_KEY";
pub const ENV_BIND: &str = "PROXYDASH_BIND";
pub const ENV_ALLOW_REMOTE: &str = "PROXYDASH_ALLOW_REMOTE";
pub const ENV_TIMEOUT: &str = "PROXYDASH_TIMEOUT";
pub const ENV_MODELS_TIMEOUT: &str = "PROXYDASH_MODELS_TIMEOUT";
pub const ENV_LOG_TAIL: &str = "PROXYDASH_LOG_TAIL";
pub const ENV_HEARTBEAT: &str = "PROXYDASH_HEARTBEAT";

pub const DEFAULT_SERVICE: &str = "cli-proxy-api";
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8317";
pub const DEFAULT_BIND: &str = "127.0.0.1:8318";

// =============================================================================
// Resolved Settings
// =============================================================================

/// Fully resolved, immutable settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Compose project directory; also the working directory of every backend call.
    pub project_dir: PathBuf,
    /// Explicit compose file, passed as `-f`.
    pub compose_file: Option<PathBuf>,
    /// Compose service name of the managed proxy.
    pub service_name: String,
    /// Container name used by the direct backend.
    pub container_name: String,
    pub backend_mode: BackendMode,
    pub docker_bin: String,
    pub command_timeout: Duration,
    pub action_timeout: Duration,
    /// Directory holding OAuth credential JSON files.
    pub auth_dir: PathBuf,
    /// The proxy's own YAML config document.
    pub proxy_config_path: PathBuf,
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub models_timeout: Duration,
    pub bind: SocketAddr,
    pub allow_remote: bool,
    /// History lines replayed when a log stream opens.
    pub log_tail: u32,
    pub heartbeat_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let project_dir = PathBuf::from(".");
        Self {
            proxy_config_path: project_dir.join("config.yaml"),
            project_dir,
            compose_file: None,
            service_name: DEFAULT_SERVICE.to_string(),
            container_name: DEFAULT_SERVICE.to_string(),
            backend_mode: BackendMode::Auto,
            docker_bin: "docker".to_string(),
            command_timeout: Duration::from_secs(15),
            action_timeout: Duration::from_secs(60),
            auth_dir: AppPaths::default_auth_dir(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            api_key: None,
            models_timeout: Duration::from_secs(10),
            bind: SocketAddr::from(([127, 0, 0, 1], 8318)),
            allow_remote: false,
            log_tail: 200,
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub config_path: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub compose_file: Option<PathBuf>,
    pub service: Option<String>,
    pub container: Option<String>,
    pub backend: Option<BackendMode>,
    pub docker_bin: Option<String>,
    pub auth_dir: Option<PathBuf>,
    pub proxy_config: Option<PathBuf>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub bind: Option<SocketAddr>,
    pub allow_remote: bool,
    pub timeout_seconds: Option<u64>,
    pub models_timeout_seconds: Option<u64>,
    pub log_tail: Option<u32>,
}

impl Settings {
    /// Resolve settings from CLI overrides, the process environment and the
    /// settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but is invalid, or any
    /// resolved value is invalid.
    pub fn resolve(overrides: &SettingsOverrides) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = overrides
            .config_path
            .clone()
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from))
            .unwrap_or_else(|| AppPaths::new().settings_file());
        let file = FileConfig::load_from(&path)?;
        Self::resolve_with(overrides, &env, &file)
    }

    /// Resolve settings against an explicit environment lookup and file.
    ///
    /// # Errors
    ///
    /// Returns an error if any value fails to parse or validate.
    pub fn resolve_with(
        overrides: &SettingsOverrides,
        env: &dyn Fn(&str) -> Option<String>,
        file: &FileConfig,
    ) -> Result<Self> {
        let defaults = Self::default();
        let env_path = |key: &str| non_empty(env(key)).map(PathBuf::from);
        let env_string = |key: &str| non_empty(env(key));

        let project_dir = overrides
            .project_dir
            .clone()
            .or_else(|| env_path(ENV_PROJECT_DIR))
            .or_else(|| file.service.project_dir.clone())
            .unwrap_or(defaults.project_dir);

        let compose_file = overrides
            .compose_file
            .clone()
            .or_else(|| env_path(ENV_COMPOSE_FILE))
            .or_else(|| file.service.compose_file.clone());

        let service_name = overrides
            .service
            .clone()
            .or_else(|| env_string(ENV_SERVICE))
            .or_else(|| file.service.name.clone())
            .unwrap_or(defaults.service_name);

        let container_name = overrides
            .container
            .clone()
            .or_else(|| env_string(ENV_CONTAINER))
            .or_else(|| file.service.container.clone())
            .unwrap_or_else(|| service_name.clone());

        let backend_mode = match overrides.backend {
            Some(mode) => mode,
            None => env_string(ENV_BACKEND)
                .or_else(|| file.service.backend.clone())
                .map(|raw| raw.parse::<BackendMode>())
                .transpose()?
                .unwrap_or_default(),
        };

        let docker_bin = overrides
            .docker_bin
            .clone()
            .or_else(|| env_string(ENV_DOCKER_BIN))
            .or_else(|| file.service.docker_bin.clone())
            .unwrap_or(defaults.docker_bin);

        let command_timeout = seconds(
            overrides.timeout_seconds,
            env_string(ENV_TIMEOUT),
            file.service.command_timeout_seconds,
            defaults.command_timeout,
            ENV_TIMEOUT,
        )?;
        let action_timeout = file
            .service
            .action_timeout_seconds
            .map_or(defaults.action_timeout, Duration::from_secs);

        let auth_dir = overrides
            .auth_dir
            .clone()
            .or_else(|| env_path(ENV_AUTH_DIR))
            .or_else(|| file.credentials.auth_dir.clone())
            .map_or(defaults.auth_dir, |dir| expand_home(&dir));

        let proxy_config_path = overrides
            .proxy_config
            .clone()
            .or_else(|| env_path(ENV_PROXY_CONFIG))
            .or_else(|| file.credentials.proxy_config.clone())
            .map_or_else(|| project_dir.join("config.yaml"), |p| expand_home(&p));

        let api_base_url = overrides
            .api_base
            .clone()
            .or_else(|| env_string(ENV_API_BASE))
            .or_else(|| file.upstream.base_url.clone())
            .unwrap_or(defaults.api_base_url)
            .trim_end_matches('/')
            .to_string();

        let api_key = overrides
            .api_key
            .clone()
            .or_else(|| env_string(ENV_API_KEY))
            .or_else(|| file.upstream.api_key.clone());

        let models_timeout = seconds(
            overrides.models_timeout_seconds,
            env_string(ENV_MODELS_TIMEOUT),
            file.upstream.timeout_seconds,
            defaults.models_timeout,
            ENV_MODELS_TIMEOUT,
        )?;

        let bind = match overrides.bind {
            Some(addr) => addr,
            None => env_string(ENV_BIND)
                .or_else(|| file.server.bind.clone())
                .map(|raw| parse_value::<SocketAddr>(&raw, ENV_BIND))
                .transpose()?
                .unwrap_or(defaults.bind),
        };

        let allow_remote = overrides.allow_remote
            || env_string(ENV_ALLOW_REMOTE).is_some_and(|v| is_truthy(&v))
            || file.server.allow_remote;

        let log_tail = match overrides.log_tail {
            Some(tail) => tail,
            None => env_string(ENV_LOG_TAIL)
                .map(|raw| parse_value::<u32>(&raw, ENV_LOG_TAIL))
                .transpose()?
                .or(file.service.log_tail)
                .unwrap_or(defaults.log_tail),
        };

        let heartbeat_interval = seconds(
            None,
            env_string(ENV_HEARTBEAT),
            file.service.heartbeat_seconds,
            defaults.heartbeat_interval,
            ENV_HEARTBEAT,
        )?;

        let settings = Self {
            project_dir,
            compose_file,
            service_name,
            container_name,
            backend_mode,
            docker_bin,
            command_timeout,
            action_timeout,
            auth_dir,
            proxy_config_path,
            api_base_url,
            api_key,
            models_timeout,
            bind,
            allow_remote,
            log_tail,
            heartbeat_interval,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate resolved values.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(invalid("service", "must not be empty"));
        }
        if self.container_name.trim().is_empty() {
            return Err(invalid("container", "must not be empty"));
        }
        if self.docker_bin.trim().is_empty() {
            return Err(invalid("docker-bin", "must not be empty"));
        }
        for (key, value) in [
            ("timeout", self.command_timeout),
            ("action-timeout", self.action_timeout),
            ("models-timeout", self.models_timeout),
            ("heartbeat", self.heartbeat_interval),
        ] {
            if value.is_zero() {
                return Err(invalid(key, "must be greater than zero"));
            }
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(invalid("api-base", "must be an http(s) URL"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ProxydashError {
    ProxydashError::ConfigInvalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_value<T: FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| ProxydashError::ConfigInvalid {
        key: key.to_string(),
        message: format!("cannot parse '{raw}'"),
    })
}

fn seconds(
    cli: Option<u64>,
    env: Option<String>,
    file: Option<u64>,
    default: Duration,
    key: &str,
) -> Result<Duration> {
    if let Some(secs) = cli {
        return Ok(Duration::from_secs(secs));
    }
    if let Some(raw) = env {
        return parse_value::<u64>(&raw, key).map(Duration::from_secs);
    }
    Ok(file.map_or(default, Duration::from_secs))
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => directories::BaseDirs::new()
            .map_or_else(|| path.to_path_buf(), |d| d.home_dir().join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

// =============================================================================
// Settings File
// =============================================================================

/// On-disk settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub service: ServiceSection,
    pub credentials: CredentialsSection,
    pub upstream: UpstreamSection,
    pub server: ServerSection,
}

/// `[service]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServiceSection {
    pub project_dir: Option<PathBuf>,
    pub compose_file: Option<PathBuf>,
    pub name: Option<String>,
    pub container: Option<String>,
    pub backend: Option<String>,
    pub docker_bin: Option<String>,
    pub command_timeout_seconds: Option<u64>,
    pub action_timeout_seconds: Option<u64>,
    pub log_tail: Option<u32>,
    pub heartbeat_seconds: Option<u64>,
}

/// `[credentials]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CredentialsSection {
    pub auth_dir: Option<PathBuf>,
    pub proxy_config: Option<PathBuf>,
}

/// `[upstream]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UpstreamSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// `[server]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerSection {
    pub bind: Option<String>,
    pub allow_remote: bool,
}

impl FileConfig {
    /// Load the settings file at `path`.
    ///
    /// Returns defaults if the file doesn't exist; errors only if it exists
    /// but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse settings TOML.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| ProxydashError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
