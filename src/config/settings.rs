//! Application settings file.
//!
//! An optional JSON file supplying defaults that command-line flags override.
//! Looked up under the XDG config directory unless a path is given.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the settings file, if the platform has a config dir.
pub fn default_settings_file() -> Option<PathBuf> {
    ProjectDirs::from("com", "portsweep", "portsweep")
        .map(|project| project.config_dir().join("settings.json"))
}

/// Defaults for scan pacing, timeouts and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Port specifications used when no `-p` flag is given.
    pub default_ports: Vec<String>,
    /// Attempts per second.
    pub rate: u32,
    /// Token bucket capacity, 0 to match `rate`.
    pub burst: u32,
    /// Worker count, 0 to derive from `rate`.
    pub workers: usize,
    /// Dial timeout in milliseconds.
    pub timeout_ms: u64,
    /// Banner read timeout in milliseconds.
    pub banner_timeout_ms: u64,
    /// Report failed connections.
    pub report_errors: bool,
    /// Shuffle host order.
    pub randomize: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_ports: vec!["22,80,443".to_string()],
            rate: 100,
            burst: 0,
            workers: 0,
            timeout_ms: 2000,
            banner_timeout_ms: 2000,
            report_errors: false,
            randomize: true,
        }
    }
}

impl AppSettings {
    /// Load settings from `path`, or from the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match default_settings_file() {
                Some(file) if file.exists() => Self::load_from(&file),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let settings_error = |reason: String| ConfigError::Settings {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| settings_error(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| settings_error(e.to_string()))
    }
}
