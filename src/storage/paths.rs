//! Application paths for settings and default data locations.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Application paths.
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
}

impl AppPaths {
    /// Create paths for the proxydash application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "proxydash") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
            }
        } else {
            let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/proxydash"),
            }
        }
    }

    /// Path to the settings file.
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Default directory holding the proxy's OAuth credential files.
    #[must_use]
    pub fn default_auth_dir() -> PathBuf {
        home_dir().map_or_else(|| PathBuf::from(".cli-proxy-api"), |h| h.join(".cli-proxy-api"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
