//! proxydash - diagnostics and control for a containerized AI API proxy.
//!
//! Reports the proxy service's runtime state through docker compose or the
//! plain container CLI, checks the freshness of the OAuth credentials it
//! uses, aggregates the models it exposes, streams its logs and runs
//! lifecycle actions. Everything is available both as a CLI and as a local
//! HTTP API.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod server;
pub mod storage;
pub mod util;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ExitCode, ProxydashError, Result};
