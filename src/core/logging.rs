//! Tracing subscriber setup.
//!
//! Logs always go to stderr (or a log file), never stdout, so one-shot
//! commands can pipe their JSON output.
//!
//! Resolution order for each knob: CLI flag, then `PROXYDASH_LOG`,
//! `PROXYDASH_LOG_FORMAT` and `PROXYDASH_LOG_FILE`, then defaults. A set
//! `RUST_LOG` replaces the computed filter entirely.

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_LEVEL_ENV: &str = "PROXYDASH_LOG";
pub const LOG_FORMAT_ENV: &str = "PROXYDASH_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "PROXYDASH_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable logs.
    #[default]
    Human,
    /// JSON logs (one event per line).
    Json,
    /// Compact logs (single line, terse).
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Parse a level name. `verbose` is an alias for debug.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "verbose" | "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "critical" => Some(Level::ERROR),
        _ => None,
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Resolve from CLI values and an environment lookup.
    ///
    /// `verbose` raises the level to at least debug. Unparseable values fall
    /// back to the next source.
    #[must_use]
    pub fn resolve(
        cli_level: Option<&str>,
        json: bool,
        verbose: bool,
        default_level: Level,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Self {
        let mut level = cli_level
            .and_then(parse_level)
            .or_else(|| env(LOG_LEVEL_ENV).as_deref().and_then(parse_level))
            .unwrap_or(default_level);
        if verbose && level < Level::DEBUG {
            level = Level::DEBUG;
        }

        let format = if json {
            LogFormat::Json
        } else {
            env(LOG_FORMAT_ENV)
                .as_deref()
                .and_then(LogFormat::from_arg)
                .unwrap_or_default()
        };

        let file = env(LOG_FILE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            level,
            format,
            file,
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    #[must_use]
    pub fn directive(&self) -> String {
        format!("proxydash={}", self.level.as_str().to_lowercase())
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &LogConfig) {
    let mut file_error = None;
    let file = config.file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| file_error = Some(format!("{}: {e}", path.display())))
            .ok()
    });

    let writer = match file {
        Some(file) => BoxMakeWriter::new(file),
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directive()));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(writer)
                .with_span_events(FmtSpan::CLOSE)
                .try_init()
                .ok();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .with_writer(writer)
                .with_target(true)
                .try_init()
                .ok();
        }
        LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_target(false)
                .try_init()
                .ok();
        }
    }

    if let Some(error) = file_error {
        tracing::warn!(error = %error, "cannot open log file, logging to stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn cli_level_beats_env() {
        let env = env_from(&[(LOG_LEVEL_ENV, "trace")]);
        let config = LogConfig::resolve(Some("warn"), false, false, Level::INFO, &env);
        assert_eq!(config.level, Level::WARN);

        let config = LogConfig::resolve(None, false, false, Level::INFO, &env);
        assert_eq!(config.level, Level::TRACE);
    }

    #[test]
    fn bad_values_fall_back() {
        let env = env_from(&[(LOG_LEVEL_ENV, "loud"), (LOG_FORMAT_ENV, "xml")]);
        let config = LogConfig::resolve(Some("shout"), false, false, Level::INFO, &env);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    fn verbose_raises_to_debug_only() {
        let env = env_from(&[]);
        let config = LogConfig::resolve(Some("error"), false, true, Level::INFO, &env);
        assert_eq!(config.level, Level::DEBUG);
        let config = LogConfig::resolve(Some("trace"), false, true, Level::INFO, &env);
        assert_eq!(config.level, Level::TRACE);
    }

    #[test]
    fn json_flag_and_env_format() {
        let env = env_from(&[(LOG_FORMAT_ENV, "compact"), (LOG_FILE_ENV, " /tmp/p.log ")]);
        assert_eq!(
            LogConfig::resolve(None, true, false, Level::INFO, &env).format,
            LogFormat::Json
        );
        let config = LogConfig::resolve(None, false, false, Level::INFO, &env);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/p.log")));
    }

    #[test]
    fn directive_targets_this_crate() {
        let config = LogConfig::resolve(Some("debug"), false, false, Level::INFO, &env_from(&[]));
        assert_eq!(config.directive(), "proxydash=debug");
    }
}
