//! proxydash - diagnostics and control for a containerized AI API proxy.
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::Level;

use proxydash::cli::commands::{self, Output};
use proxydash::cli::{Cli, Commands};
use proxydash::core::cli_runner::{CommandRunner, TokioCommandRunner};
use proxydash::core::logging::{self, LogConfig};
use proxydash::storage::config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The server logs at info by default; one-shot commands stay quiet.
    let default_level = if matches!(cli.command, Commands::Serve(_)) {
        Level::INFO
    } else {
        Level::WARN
    };
    let log_config = LogConfig::resolve(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
        default_level,
        &|key: &str| std::env::var(key).ok(),
    );
    logging::init(&log_config);

    match run(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!(error = %e, category = %e.category(), "command failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> proxydash::Result<proxydash::ExitCode> {
    let settings = Arc::new(Settings::resolve(&cli.overrides())?);
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    let out = Output {
        format: cli.effective_format(),
        pretty: cli.pretty,
    };
    tracing::debug!(
        backend = %settings.backend_mode,
        service = %settings.service_name,
        "settings resolved"
    );

    match &cli.command {
        Commands::Serve(_) => commands::serve(settings, runner).await,
        Commands::State => commands::state(&settings, runner.as_ref(), out).await,
        Commands::Auth => commands::auth(&settings, out).await,
        Commands::Models => commands::models(&settings, out).await,
        Commands::Diagnostics => commands::diagnostics(&settings, runner.as_ref(), out).await,
        Commands::Logs(args) => {
            commands::logs(&settings, runner.as_ref(), args.target.as_deref(), out).await
        }
        Commands::Start => commands::action(&settings, runner.as_ref(), "start", out).await,
        Commands::Stop => commands::action(&settings, runner.as_ref(), "stop", out).await,
        Commands::Restart => commands::action(&settings, runner.as_ref(), "restart", out).await,
    }
}
