//! CLI layer: argument parsing, command handlers and text output.

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Cli, Commands, OutputFormat};
