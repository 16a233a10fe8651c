//! Configuration management for portsweep.
//!
//! `ScanConfiguration` is built once from the command line (with defaults from
//! an optional settings file) and never mutated afterwards.

mod scan;
mod settings;

pub use scan::{
    ScanConfiguration, ScanParams, DEFAULT_MAX_HOSTS, DEFAULT_RATE, MAX_WORKERS, WORKER_SLACK,
};
pub use settings::{default_settings_file, AppSettings};
