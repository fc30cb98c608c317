//! Settings and filesystem locations.

pub mod config;
pub mod paths;

pub use config::{FileConfig, Settings, SettingsOverrides};
pub use paths::AppPaths;
