//! CLI argument definitions using clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::backend::BackendMode;
use crate::storage::config::{
    ENV_API_BASE, ENV_API_KEY, ENV_AUTH_DIR, ENV_CONFIG, SettingsOverrides,
};

/// Diagnostics and control for a containerized AI API proxy.
#[derive(Parser, Debug)]
#[command(name = "proxydash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub settings: SettingsArgs,

    // === Global output flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }

    /// Settings overrides from global flags and subcommand flags.
    #[must_use]
    pub fn overrides(&self) -> SettingsOverrides {
        let mut overrides = self.settings.overrides();
        match &self.command {
            Commands::Serve(serve) => {
                overrides.bind = serve.bind;
                overrides.allow_remote = serve.allow_remote;
            }
            Commands::Logs(logs) => overrides.log_tail = logs.tail,
            _ => {}
        }
        overrides
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the local diagnostics API
    Serve(ServeArgs),

    /// Show the managed service's runtime state
    State,

    /// Show credential freshness per provider
    Auth,

    /// List upstream models grouped by provider
    Models,

    /// Print the full diagnostics report
    Diagnostics,

    /// Follow service logs
    Logs(LogsArgs),

    /// Start the managed service
    Start,

    /// Stop the managed service
    Stop,

    /// Restart the managed service
    Restart,
}

/// Global flags that override settings.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Settings file (default: platform config dir)
    #[arg(long, value_name = "PATH", global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Compose project directory
    #[arg(long, value_name = "DIR", global = true)]
    pub project_dir: Option<PathBuf>,

    /// Compose file passed as -f
    #[arg(long, value_name = "PATH", global = true)]
    pub compose_file: Option<PathBuf>,

    /// Compose service name
    #[arg(long, value_name = "NAME", global = true)]
    pub service: Option<String>,

    /// Container name for the direct backend (default: service name)
    #[arg(long, value_name = "NAME", global = true)]
    pub container: Option<String>,

    /// Backend mode (auto, compose, docker)
    #[arg(long, value_name = "MODE", global = true)]
    pub backend: Option<BackendMode>,

    /// Container CLI program
    #[arg(long, value_name = "PROGRAM", global = true)]
    pub docker_bin: Option<String>,

    /// Directory holding OAuth credential files
    #[arg(long, value_name = "DIR", global = true, env = ENV_AUTH_DIR)]
    pub auth_dir: Option<PathBuf>,

    /// The proxy's YAML config
    #[arg(long, value_name = "PATH", global = true)]
    pub proxy_config: Option<PathBuf>,

    /// Base URL of the proxy's model listing API
    #[arg(long, value_name = "URL", global = true, env = ENV_API_BASE)]
    pub api_base: Option<String>,

    /// Key sent to the model listing API
    #[arg(long, value_name = "KEY", global = true, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Backend command timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Model listing timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub models_timeout: Option<u64>,
}

impl SettingsArgs {
    #[must_use]
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            config_path: self.config.clone(),
            project_dir: self.project_dir.clone(),
            compose_file: self.compose_file.clone(),
            service: self.service.clone(),
            container: self.container.clone(),
            backend: self.backend,
            docker_bin: self.docker_bin.clone(),
            auth_dir: self.auth_dir.clone(),
            proxy_config: self.proxy_config.clone(),
            api_base: self.api_base.clone(),
            api_key: self.api_key.clone(),
            timeout_seconds: self.timeout,
            models_timeout_seconds: self.models_timeout,
            ..SettingsOverrides::default()
        }
    }
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Accept callers outside the loopback network
    #[arg(long)]
    pub allow_remote: bool,
}

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Service or container to follow (default: the managed service)
    pub target: Option<String>,

    /// History lines to replay first
    #[arg(long, value_name = "N")]
    pub tail: Option<u32>,
}

/// Output format.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}
