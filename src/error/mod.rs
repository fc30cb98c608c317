//! Error types for proxydash.
//!
//! Uses `thiserror` for structured error types that map to exit codes and
//! HTTP status codes.
//!
//! ## Error Taxonomy
//!
//! - **Validation**: Unknown action names, malformed path parameters
//! - **Configuration**: Settings file parsing, invalid values
//! - **Network**: Listener binding, upstream connection failures, timeouts
//! - **Environment**: Missing tools or directories
//! - **Access**: Non-local callers on a local-only endpoint
//! - **Internal**: I/O, serialization, unclassified issues
//!
//! Most diagnostic operations never return these errors: tool and network
//! failures are folded into the report structs they produce. Errors surface
//! only where a request cannot be served at all.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller supplied an invalid request.
    Validation,
    /// Configuration issues (parse errors, invalid values).
    Configuration,
    /// Network issues (bind failures, timeouts, connection refused).
    Network,
    /// Environment issues (missing tools or directories).
    Environment,
    /// Caller is not allowed to reach the endpoint.
    Access,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Validation error",
            Self::Configuration => "Configuration error",
            Self::Network => "Network error",
            Self::Environment => "Environment error",
            Self::Access => "Access error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure, or the requested operation reported failure
    GeneralError = 1,
    /// Managed backend tool not found
    BinaryNotFound = 2,
    /// Invalid arguments or configuration
    InvalidInput = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for proxydash operations.
#[derive(Error, Debug)]
pub enum ProxydashError {
    // ==========================================================================
    // Validation errors
    // ==========================================================================
    /// Action name is not one of start, stop, restart.
    #[error("unknown action '{0}' (expected start, stop or restart)")]
    InvalidAction(String),

    /// Log target is empty or contains characters a container name cannot.
    #[error("invalid log target '{0}'")]
    InvalidTarget(String),

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Error parsing a configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid { key: String, message: String },

    // ==========================================================================
    // Environment errors
    // ==========================================================================
    /// Managed backend CLI not found in PATH.
    #[error("CLI tool not found: {name}")]
    CliNotFound { name: String },

    // ==========================================================================
    // Network errors
    // ==========================================================================
    /// Could not bind the diagnostics listener.
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    /// A backend call hit its hard timeout.
    #[error("timeout after {0} seconds")]
    Timeout(u64),

    /// Generic network error.
    #[error("network error: {0}")]
    Network(String),

    // ==========================================================================
    // Access errors
    // ==========================================================================
    /// Caller is outside the loopback network.
    #[error("forbidden")]
    Forbidden,

    // ==========================================================================
    // Internal errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProxydashError {
    /// Map error to a CLI exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::CliNotFound { .. } => ExitCode::BinaryNotFound,

            Self::InvalidAction(_)
            | Self::InvalidTarget(_)
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. } => ExitCode::InvalidInput,

            Self::Timeout(_) => ExitCode::Timeout,

            Self::Bind { .. }
            | Self::Network(_)
            | Self::Forbidden
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAction(_) | Self::InvalidTarget(_) => ErrorCategory::Validation,

            Self::ConfigParse { .. } | Self::ConfigInvalid { .. } => ErrorCategory::Configuration,

            Self::CliNotFound { .. } => ErrorCategory::Environment,

            Self::Bind { .. } | Self::Timeout(_) | Self::Network(_) => ErrorCategory::Network,

            Self::Forbidden => ErrorCategory::Access,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP status code used when this error is returned by the API.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation => 400,
            ErrorCategory::Access => 403,
            ErrorCategory::Network => match self {
                Self::Timeout(_) => 504,
                _ => 502,
            },
            ErrorCategory::Configuration
            | ErrorCategory::Environment
            | ErrorCategory::Internal => 500,
        }
    }

    /// Whether this is a caller mistake rather than a service problem.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self.category(), ErrorCategory::Validation)
    }
}

/// Result type alias for proxydash operations.
pub type Result<T> = std::result::Result<T, ProxydashError>;
