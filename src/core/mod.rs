//! Diagnostics engine: backend control, credential and model checks.

pub mod actions;
pub mod backend;
pub mod cli_runner;
pub mod credential_health;
pub mod diagnostics;
pub mod http;
pub mod log_stream;
pub mod logging;
pub mod models;
pub mod provider;
pub mod service_state;

pub use actions::{ActionDispatcher, ActionReport};
pub use backend::{Backend, BackendKind, BackendMode, ServiceAction};
pub use cli_runner::{CommandOutcome, CommandRunner, CommandSpec, TokioCommandRunner};
pub use credential_health::{
    AuthMode, AuthReport, CredentialFile, FreshnessLevel, ProviderHealth,
};
pub use diagnostics::DiagnosticsReport;
pub use log_stream::{LineFramer, LogEvent, LogEventKind, LogStream, StreamItem, StreamState};
pub use models::{ModelCatalog, ModelEntry, ProviderGroup, SourceApi};
pub use provider::Provider;
pub use service_state::{DiscoveredState, ServiceState, StateResolver, StateSummary};
